// Key identity and event kind delivered to listener callbacks

use std::fmt;

/// Whether a key went down or came up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Press,
    Release,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventType::Press => write!(f, "press"),
            EventType::Release => write!(f, "release"),
        }
    }
}

/// A key as reported by the capture backend.
///
/// Printable letters and digits carry their character; everything else
/// keeps the backend's key name (`Space`, `LShift`, `F5`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyIdentity {
    Char(char),
    Named(String),
}

impl KeyIdentity {
    /// Build an identity from a backend key name such as `A`, `Key7` or `Escape`.
    pub fn from_key_name(name: &str) -> Self {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => {
                return KeyIdentity::Char(c.to_ascii_lowercase());
            }
            _ => {}
        }

        if let Some(digit) = name.strip_prefix("Key") {
            let mut chars = digit.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                if c.is_ascii_digit() {
                    return KeyIdentity::Char(c);
                }
            }
        }

        KeyIdentity::Named(name.to_string())
    }
}

impl fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyIdentity::Char(c) => write!(f, "{}", c),
            KeyIdentity::Named(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_become_lowercase_chars() {
        assert_eq!(KeyIdentity::from_key_name("A"), KeyIdentity::Char('a'));
        assert_eq!(KeyIdentity::from_key_name("z"), KeyIdentity::Char('z'));
    }

    #[test]
    fn test_digit_keys_become_chars() {
        assert_eq!(KeyIdentity::from_key_name("Key7"), KeyIdentity::Char('7'));
        assert_eq!(KeyIdentity::from_key_name("3"), KeyIdentity::Char('3'));
    }

    #[test]
    fn test_other_keys_keep_their_name() {
        assert_eq!(
            KeyIdentity::from_key_name("Space"),
            KeyIdentity::Named("Space".to_string())
        );
        assert_eq!(
            KeyIdentity::from_key_name("Keypad5"),
            KeyIdentity::Named("Keypad5".to_string())
        );
        assert_eq!(KeyIdentity::from_key_name("LShift").to_string(), "LShift");
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::Press.to_string(), "press");
        assert_eq!(EventType::Release.to_string(), "release");
    }
}
