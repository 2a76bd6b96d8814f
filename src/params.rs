//! The ELAN parameter protocol.
//!
//! When ELAN starts a local recognizer it writes the user's settings to the
//! recognizer's stdin as a sequence of lines shaped like
//! `<param name="onset">0.5</param>`, then closes the stream. This module
//! decodes that stream into a flat name → value map and provides the typed
//! accessors the rest of the crate builds its configuration from.
//!
//! File names arrive with XML character entities applied (e.g. `&apos;` for
//! `'`), so path accessors decode entities before the values are used as
//! actual paths.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;

use regex::Regex;

use crate::error::{Error, Result};

/// The parameters ELAN passed to this recognizer, keyed by parameter name.
#[derive(Debug, Default, Clone)]
pub struct ParamMap {
    values: HashMap<String, String>,
}

impl ParamMap {
    /// Read `<param name="...">value</param>` lines until end of input.
    ///
    /// Lines that don't match the parameter shape are ignored, values are
    /// trimmed, and a repeated name keeps the last value seen.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let pattern = Regex::new(r#"<param name="(.*?)".*?>(.*?)</param>"#)
            .expect("parameter pattern is valid");

        let mut params = Self::default();
        for line in reader.lines() {
            let line = line?;
            if let Some(captures) = pattern.captures(&line) {
                params.insert(&captures[1], captures[2].trim());
            }
        }
        Ok(params)
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Fetch a required parameter.
    ///
    /// An empty value counts as missing: ELAN sends every declared parameter
    /// even when the user left the field blank.
    pub fn require(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::MissingParam(name.to_string())),
        }
    }

    /// Fetch a required file-path parameter, decoding XML entities.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(unescape_entities(self.require(name)?)))
    }

    /// Fetch an optional file-path parameter, decoding XML entities.
    ///
    /// Absent and empty both mean "not provided".
    pub fn opt_path(&self, name: &str) -> Option<PathBuf> {
        match self.get(name) {
            Some(value) if !value.is_empty() => Some(PathBuf::from(unescape_entities(value))),
            _ => None,
        }
    }

    /// Fetch a required floating-point parameter.
    pub fn f32(&self, name: &str) -> Result<f32> {
        let raw = self.require(name)?;
        raw.parse::<f32>()
            .map_err(|err| Error::msg(format!("parameter '{name}' is not a number ({raw}): {err}")))
    }

    /// Fetch a speaker-count parameter that uses a sentinel for "not set".
    ///
    /// The ELAN recognizer UI uses `Unknown` for `num_speakers` and `_` for
    /// the min/max bounds.
    pub fn speaker_count(&self, name: &str, sentinel: &str) -> Result<Option<usize>> {
        let raw = self.require(name)?;
        if raw == sentinel {
            return Ok(None);
        }
        let count = raw.parse::<usize>().map_err(|err| {
            Error::msg(format!("parameter '{name}' is not a speaker count ({raw}): {err}"))
        })?;
        Ok(Some(count))
    }
}

/// Decode the XML character entities ELAN applies to file names.
///
/// Handles the five named entities plus numeric (`&#NN;` / `&#xNN;`)
/// references. Unrecognized sequences are kept literally.
pub fn unescape_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];

        if let Some(semi) = candidate.find(';') {
            if let Some(decoded) = decode_entity(&candidate[1..semi]) {
                out.push(decoded);
                rest = &candidate[semi + 1..];
                continue;
            }
        }

        // Not a recognized entity reference; keep the ampersand literal.
        out.push('&');
        rest = &candidate[1..];
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let reference = name.strip_prefix('#')?;
            let code = match reference.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => reference.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
