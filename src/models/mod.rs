pub mod booking;
pub mod customer;
pub mod payment;

pub use booking::{Booking, BookingStatus};
pub use customer::Customer;
pub use payment::{Payment, PaymentProvider, PaymentStatus};
