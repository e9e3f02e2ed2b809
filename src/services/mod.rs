pub mod checkout;
pub mod exchange;
pub mod mailer;
pub mod payments;
pub mod rate_limit;
