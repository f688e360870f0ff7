//! Custom key/value property exposed for host introspection
//!
//! The device does not interpret the pairs; they are stored and handed back.

use std::fmt;

/// Four-character property selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCharCode(pub u32);

impl FourCharCode {
    pub const fn from_bytes(bytes: &[u8; 4]) -> Self {
        FourCharCode(u32::from_be_bytes(*bytes))
    }
}

impl fmt::Display for FourCharCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.to_be_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Selector of the device's custom property
pub const CUSTOM_PROPERTY_SELECTOR: FourCharCode = FourCharCode::from_bytes(b"sadc");

/// String qualifier/value store
#[derive(Debug, Clone, PartialEq)]
pub struct CustomProperty {
    selector: FourCharCode,
    settable: bool,
    entries: Vec<(String, String)>,
}

impl CustomProperty {
    pub fn new(selector: FourCharCode, settable: bool) -> Self {
        Self {
            selector,
            settable,
            entries: Vec::new(),
        }
    }

    /// Insert or replace the value stored under `qualifier`
    pub fn set_qualifier_and_data_value(
        &mut self,
        qualifier: impl Into<String>,
        value: impl Into<String>,
    ) {
        let qualifier = qualifier.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(q, _)| *q == qualifier) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((qualifier, value)),
        }
    }

    pub fn data_value(&self, qualifier: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(q, _)| q == qualifier)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn selector(&self) -> FourCharCode {
        self.selector
    }

    pub fn is_settable(&self) -> bool {
        self.settable
    }
}

impl Default for CustomProperty {
    /// The two pairs every device publishes
    fn default() -> Self {
        let mut property = Self::new(CUSTOM_PROPERTY_SELECTOR, true);
        property.set_qualifier_and_data_value("Qualifier-0", "Default-0");
        property.set_qualifier_and_data_value("Qualifier-1", "Default-1");
        property
    }
}
