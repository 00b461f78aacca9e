// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion between property values and their display strings.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::DeviceError;

type ToDisplay<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;
type FromDisplay<T> = Arc<dyn Fn(&str) -> Result<T, DeviceError> + Send + Sync>;

/// A pair of conversions between a value and the text shown to users.
///
/// Property panels show every value as text and accept edits as text. Each
/// cell may carry a codec; [`DisplayCodec::parsed`] covers any type with
/// `Display` and `FromStr`.
///
/// # Examples
///
/// ```
/// use instrument_lib::cell::DisplayCodec;
///
/// let celsius = DisplayCodec::new(
///     |v: &f64| format!("{v:.1} °C"),
///     |s| s.trim_end_matches("°C").trim().parse().map_err(|e| {
///         instrument_lib::error::DeviceError::Parse(format!("{e}"))
///     }),
/// );
///
/// assert_eq!(celsius.to_display(&21.0), "21.0 °C");
/// assert_eq!(celsius.from_display("19.5 °C").unwrap(), 19.5);
/// ```
pub struct DisplayCodec<T> {
    to_display: ToDisplay<T>,
    from_display: FromDisplay<T>,
}

impl<T> DisplayCodec<T> {
    /// Creates a codec from a pair of conversion functions.
    pub fn new(
        to_display: impl Fn(&T) -> String + Send + Sync + 'static,
        from_display: impl Fn(&str) -> Result<T, DeviceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            to_display: Arc::new(to_display),
            from_display: Arc::new(from_display),
        }
    }

    /// Renders a value for display.
    #[must_use]
    pub fn to_display(&self, value: &T) -> String {
        (self.to_display)(value)
    }

    /// Parses a displayed string back into a value.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Parse` if the text is not a valid value.
    pub fn from_display(&self, text: &str) -> Result<T, DeviceError> {
        (self.from_display)(text)
    }
}

impl<T> DisplayCodec<T>
where
    T: Display + FromStr + 'static,
    T::Err: Display,
{
    /// Uses the value's `Display` and `FromStr` implementations.
    #[must_use]
    pub fn parsed() -> Self {
        Self::new(T::to_string, |text| {
            text.trim()
                .parse()
                .map_err(|e: T::Err| DeviceError::Parse(format!("'{text}': {e}")))
        })
    }
}

impl<T> Clone for DisplayCodec<T> {
    fn clone(&self) -> Self {
        Self {
            to_display: Arc::clone(&self.to_display),
            from_display: Arc::clone(&self.from_display),
        }
    }
}

impl<T> std::fmt::Debug for DisplayCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_codec_uses_display_and_from_str() {
        let codec = DisplayCodec::<i32>::parsed();

        assert_eq!(codec.to_display(&-7), "-7");
        assert_eq!(codec.from_display(" 42 ").unwrap(), 42);
    }

    #[test]
    fn parsed_codec_reports_bad_input() {
        let codec = DisplayCodec::<u8>::parsed();

        let err = codec.from_display("300").unwrap_err();
        assert!(matches!(err, DeviceError::Parse(msg) if msg.starts_with("'300'")));
    }

    #[test]
    fn custom_codec_maps_enumerations() {
        let codec = DisplayCodec::new(
            |on: &bool| if *on { "ON".to_string() } else { "OFF".to_string() },
            |text| match text {
                "ON" => Ok(true),
                "OFF" => Ok(false),
                other => Err(DeviceError::Parse(other.to_string())),
            },
        );

        assert_eq!(codec.to_display(&true), "ON");
        assert!(!codec.from_display("OFF").unwrap());
        assert!(codec.from_display("MAYBE").is_err());
    }
}
