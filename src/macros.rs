/// Generates `FromStr` and optionally `Display` impls for simple string enums.
///
/// Parsing lowercases the input, so config values are case-insensitive.
///
/// # Forms
///
/// - `str_enum!(Enum, ErrType, "msg", ...)` — both `Display` + `FromStr`
/// - `str_enum!(fromstr Enum, ErrType, "msg", ...)` — `FromStr` only
macro_rules! str_enum {
    // ── Full form: Display + FromStr ──
    ($enum_name:ident, $err_kind:ident, $err_msg:literal,
        $( $variant:ident => $display:literal $(, $alias:literal)* );+ $(;)?
    ) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $( Self::$variant => $display, )+
                };
                f.write_str(s)
            }
        }
        str_enum!(fromstr $enum_name, $err_kind, $err_msg,
            $( $variant => $display $(, $alias)* );+);
    };

    // ── FromStr-only form, BridgeError error type ──
    (fromstr $enum_name:ident, BridgeError, $err_msg:literal,
        $( $variant:ident => $canonical:literal $(, $alias:literal)* );+ $(;)?
    ) => {
        impl std::str::FromStr for $enum_name {
            type Err = crate::error::BridgeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $( $canonical $(| $alias)* => Ok(Self::$variant), )+
                    other => Err(crate::error::BridgeError::ConfigurationError(
                        format!("{}: '{}'", $err_msg, other),
                    )),
                }
            }
        }
    };

    // ── FromStr-only form, String error type ──
    (fromstr $enum_name:ident, String, $err_msg:literal,
        $( $variant:ident => $canonical:literal $(, $alias:literal)* );+ $(;)?
    ) => {
        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $( $canonical $(| $alias)* => Ok(Self::$variant), )+
                    other => Err(format!("{}: '{}'", $err_msg, other)),
                }
            }
        }
    };
}
