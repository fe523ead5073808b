mod error;

pub(crate) use self::error::fatal;
