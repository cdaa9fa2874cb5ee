pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Returns an `InvalidArgument` error from the enclosing function unless the
/// condition holds. The argument name and the failed condition end up in the
/// error message.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $cond:expr) => {
        if !$cond {
            return Err($crate::error::Error::invalid_arg(
                stringify!($name),
                concat!("condition failed: ", stringify!($cond)),
            ));
        }
    };
}

/// Returns an `InvalidFormat` error from the enclosing function unless the
/// condition holds. For validating data read from storage rather than caller
/// input.
#[macro_export]
macro_rules! verify_data {
    ($name:expr, $cond:expr) => {
        if !$cond {
            return Err($crate::error::Error::invalid_format(
                stringify!($name),
                concat!("condition failed: ", stringify!($cond)),
            ));
        }
    };
}
