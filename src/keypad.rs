//! Digit entry buffer behind the on-screen keypad.

use crate::catalog::SongCode;

/// Collects up to [`SongCode::KEYPAD_LEN`] digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypad {
    digits: String,
    max_len: usize,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad {
    pub fn new() -> Self {
        Self::with_max_len(SongCode::KEYPAD_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            digits: String::with_capacity(max_len),
            max_len,
        }
    }

    /// Append a digit. Non-digits and input past the limit are ignored.
    pub fn push_digit(&mut self, c: char) -> bool {
        if !c.is_ascii_digit() || self.is_full() {
            return false;
        }
        self.digits.push(c);
        true
    }

    pub fn backspace(&mut self) -> Option<char> {
        self.digits.pop()
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    /// Full buffers are worth a live lookup.
    pub fn is_full(&self) -> bool {
        self.digits.len() >= self.max_len
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    /// The typed code, if any.
    pub fn code(&self) -> Option<SongCode> {
        SongCode::new(&self.digits)
    }

    /// Hand over the code once all digits are in; a partial entry stays put.
    pub fn submit(&mut self) -> Option<SongCode> {
        if self.is_full() {
            self.take()
        } else {
            None
        }
    }

    /// Hand over the typed code and start again.
    pub fn take(&mut self) -> Option<SongCode> {
        let code = self.code();
        self.digits.clear();
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(input: &str) -> Keypad {
        let mut keypad = Keypad::new();
        for c in input.chars() {
            keypad.push_digit(c);
        }
        keypad
    }

    #[test]
    fn test_stops_at_five_digits() {
        let mut keypad = typed("1234567");
        assert_eq!(keypad.as_str(), "12345");
        assert!(keypad.is_full());
        assert!(!keypad.push_digit('9'));
    }

    #[test]
    fn test_ignores_non_digits() {
        let keypad = typed("1a2-3");
        assert_eq!(keypad.as_str(), "123");
        assert!(!keypad.is_full());
    }

    #[test]
    fn test_backspace_and_clear() {
        let mut keypad = typed("123");
        assert_eq!(keypad.backspace(), Some('3'));
        assert_eq!(keypad.as_str(), "12");
        keypad.clear();
        assert!(keypad.is_empty());
        assert_eq!(keypad.backspace(), None);
    }

    #[test]
    fn test_submit_needs_every_digit() {
        let mut keypad = typed("4242");
        assert!(keypad.submit().is_none());
        assert_eq!(keypad.as_str(), "4242");
        keypad.push_digit('2');
        assert_eq!(keypad.submit().unwrap().as_str(), "42422");
        assert!(keypad.is_empty());
    }

    #[test]
    fn test_take_resets() {
        let mut keypad = typed("00042");
        assert_eq!(keypad.take().unwrap().as_str(), "00042");
        assert!(keypad.is_empty());
        assert!(keypad.take().is_none());
    }
}
