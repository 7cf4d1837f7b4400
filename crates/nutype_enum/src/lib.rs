//! A small macro for declaring "nutype" enums: a newtype wrapping a primitive
//! that carries a set of named constants but, unlike a real `enum`, still
//! accepts values outside that set.
//!
//! This is the right shape for wire-format tags (message type ids, AMF
//! markers, RTMP header types, ...) where an unrecognized byte is a valid,
//! representable value that the caller may still want to match on or log,
//! rather than a state the type system should make unreachable.
#![deny(unsafe_code)]

/// Declares a byte/int-backed "nutype" with named constants.
///
/// ```
/// nutype_enum::nutype_enum! {
///     pub enum MessageType(u8) {
///         SetChunkSize = 1,
///         Abort = 2,
///     }
/// }
///
/// assert_eq!(MessageType::Abort.0, 2);
/// assert_eq!(MessageType(2), MessageType::Abort);
/// assert_eq!(format!("{}", MessageType::Abort), "Abort (2)");
/// assert_eq!(format!("{}", MessageType(99)), "Unknown (99)");
/// ```
#[macro_export]
macro_rules! nutype_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($repr:ty) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $vis struct $name(pub $repr);

        #[allow(non_upper_case_globals)]
        impl $name {
            $(
                $(#[$variant_meta])*
                $vis const $variant: $name = $name($value);
            )*

            /// Returns the name of this variant, if it is one of the known constants.
            $vis fn name(&self) -> ::core::option::Option<&'static str> {
                match self.0 {
                    $(
                        $value => ::core::option::Option::Some(::core::stringify!($variant)),
                    )*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::core::convert::From<$repr> for $name {
            fn from(value: $repr) -> Self {
                $name(value)
            }
        }

        impl ::core::convert::From<$name> for $repr {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match self.name() {
                    ::core::option::Option::Some(name) => write!(f, "{name} ({})", self.0),
                    ::core::option::Option::None => write!(f, "Unknown ({})", self.0),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    nutype_enum! {
        pub enum Animal(u8) {
            Dog = 1,
            Cat = 2,
        }
    }

    #[test]
    fn known_variant_round_trips() {
        assert_eq!(Animal::Dog.0, 1);
        assert_eq!(Animal::from(2), Animal::Cat);
        assert_eq!(u8::from(Animal::Cat), 2);
        assert_eq!(Animal::Dog.name(), Some("Dog"));
    }

    #[test]
    fn unknown_value_is_still_representable() {
        let unknown = Animal(42);
        assert_eq!(unknown.name(), None);
        assert_eq!(format!("{unknown}"), "Unknown (42)");
    }
}
