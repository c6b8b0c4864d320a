use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid date '{text}': {reason}")]
    InvalidDate { text: String, reason: String },

    #[error("Date out of representable range: {seconds} s from J2000")]
    DateOutOfRange { seconds: i64 },
}
