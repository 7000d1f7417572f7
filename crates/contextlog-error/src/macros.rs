// Error handling macros
// Provides macros for simplified error handling

/// Return early with an error if a condition is not satisfied
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error:expr) => {
        if !($cond) {
            return Err($error.into());
        }
    };
}

/// Bail early with an error
#[macro_export]
macro_rules! bail {
    ($error:expr) => {
        return Err($error.into());
    };
}

/// Log an error and continue
#[macro_export]
macro_rules! log_error {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(err) => {
                $crate::__tracing::error!("Error: {}", err);
                continue;
            }
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(val) => val,
            Err(err) => {
                $crate::__tracing::error!("{}: {}", $message, err);
                continue;
            }
        }
    };
}

/// Convert a Result to an Option, logging the error if it exists
#[macro_export]
macro_rules! result_to_option {
    ($result:expr) => {
        match $result {
            Ok(val) => Some(val),
            Err(err) => {
                $crate::__tracing::warn!("Error: {}", err);
                None
            }
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(val) => Some(val),
            Err(err) => {
                $crate::__tracing::warn!("{}: {}", $message, err);
                None
            }
        }
    };
}
