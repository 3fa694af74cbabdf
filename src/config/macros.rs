/// Configuration macros for zero-repetition config definitions
///
/// `config_struct!` defines a configuration section with its defaults in one
/// declaration and generates:
/// - The struct with public fields
/// - The `Default` implementation
/// - Serde support with `#[serde(default)]`, so partial TOML files work
///
/// # Example
/// ```
/// riskrouter::config_struct! {
///     pub struct GuardConfig {
///         threshold: f64 = 0.7,
///         window_minutes: i64 = 30,
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}

/// Reject a field value that fails a predicate
///
/// Expands to an early `return Err(RiskCoreError::Configuration { .. })`.
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $field:expr, $($reason:tt)+) => {
        if !$cond {
            return Err($crate::errors::RiskCoreError::config($field, format!($($reason)+)));
        }
    };
}
