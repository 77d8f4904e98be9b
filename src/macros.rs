/// Declares a small fieldless enum backed by a fixed-width wire code,
/// along with a `to_wire` accessor and a `TryFrom<$repr>` that yields the
/// raw value back on mismatch (so callers can report "unrecognized X" with
/// the value that didn't match).
#[macro_export]
macro_rules! wire_code {
    ($(#[$meta:meta])* pub enum $name:ident: $repr:ty { $($variant:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr($repr)]
        pub enum $name {
            $($variant = $value),*
        }

        impl $name {
            pub const fn to_wire(self) -> $repr {
                self as $repr
            }
        }

        impl core::convert::TryFrom<$repr> for $name {
            type Error = $repr;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)*
                    other => Err(other),
                }
            }
        }
    };
}
