//! Reader for JSON gate library files (`.hgl`).
//!
//! ```json
//! {
//!   "library": "example_lib",
//!   "cells": [
//!     {
//!       "name": "AND2",
//!       "types": ["combinational"],
//!       "pins": [
//!         { "name": "A", "direction": "input" },
//!         { "name": "B", "direction": "input" },
//!         { "name": "O", "direction": "output", "function": "A & B" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Cells without `types` are combinational. LUT, flip-flop and latch cells
//! must carry the matching `lut_config`, `ff_config` or `latch_config`.

use std::collections::BTreeMap;
use std::path::Path;

use gatelens_core::library::{
    ClearPresetBehavior, GateLibrary, GateLibraryError, GateType, GateTypeProperty, LutConfig,
    PinDef, PinType, SequentialConfig,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::LibraryError;
use crate::manager::GateLibraryParser;

#[derive(Debug, Deserialize)]
struct RawLibrary {
    library: Option<String>,
    cells: Option<Vec<RawCell>>,
}

#[derive(Debug, Deserialize)]
struct RawCell {
    name: Option<String>,
    types: Option<Vec<String>>,
    #[serde(default)]
    pins: Vec<RawPin>,
    #[serde(default)]
    groups: Vec<RawGroup>,
    lut_config: Option<RawLutConfig>,
    ff_config: Option<RawSequentialConfig>,
    latch_config: Option<RawSequentialConfig>,
}

#[derive(Debug, Deserialize)]
struct RawPin {
    name: Option<String>,
    direction: Option<String>,
    #[serde(rename = "type")]
    pin_type: Option<String>,
    function: Option<String>,
    x_function: Option<String>,
    z_function: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    name: Option<String>,
    pins: Option<Vec<BTreeMap<String, String>>>,
}

#[derive(Debug, Deserialize)]
struct RawLutConfig {
    bit_order: Option<String>,
    data_category: Option<String>,
    data_identifier: Option<String>,
}

/// Shared shape of `ff_config` and `latch_config`.
#[derive(Debug, Default, Deserialize)]
struct RawSequentialConfig {
    next_state: Option<String>,
    clocked_on: Option<String>,
    data_in: Option<String>,
    enable_on: Option<String>,
    clear_on: Option<String>,
    preset_on: Option<String>,
    state_clear_preset: Option<String>,
    neg_state_clear_preset: Option<String>,
    data_category: Option<String>,
    data_identifier: Option<String>,
}

/// Gate library backend for the JSON `.hgl` format.
#[derive(Debug, Default, Clone, Copy)]
pub struct HglReader;

impl GateLibraryParser for HglReader {
    fn parse(&mut self, path: &Path, source: &str) -> Result<GateLibrary, LibraryError> {
        parse_hgl(path, source)
    }
}

/// Parse the contents of a `.hgl` file located at `path`.
pub fn parse_hgl(path: &Path, source: &str) -> Result<GateLibrary, LibraryError> {
    let raw: RawLibrary = serde_json::from_str(source).map_err(|source| LibraryError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let name = raw.library.ok_or_else(|| LibraryError::MissingField {
        field: "library",
        context: path.display().to_string(),
    })?;
    let cells = raw.cells.ok_or_else(|| LibraryError::MissingField {
        field: "cells",
        context: path.display().to_string(),
    })?;

    let mut library = GateLibrary::new(name, path);
    for (index, cell) in cells.into_iter().enumerate() {
        let gate_type = build_gate_type(index, cell)?;
        let cell_name = gate_type.name().to_string();
        library
            .add_gate_type(gate_type)
            .map_err(|e| LibraryError::InvalidCell {
                cell: cell_name,
                message: e.to_string(),
            })?;
    }

    debug!(
        target: "gatelens::library",
        library = library.name(),
        gate_types = library.len(),
        "hgl library parsed"
    );
    Ok(library)
}

fn build_gate_type(index: usize, cell: RawCell) -> Result<GateType, LibraryError> {
    let name = cell.name.ok_or_else(|| LibraryError::MissingField {
        field: "name",
        context: format!("cell #{index}"),
    })?;
    let invalid = |message: String| LibraryError::InvalidCell {
        cell: name.clone(),
        message,
    };
    let unknown = |e: GateLibraryError| invalid(e.to_string());

    let mut gate_type = GateType::new(name.clone());
    match cell.types {
        Some(types) => {
            for t in types {
                gate_type.add_property(t.parse().map_err(unknown)?);
            }
        }
        None => gate_type.add_property(GateTypeProperty::Combinational),
    }

    // Pin functions are attached last so that every pin is known first.
    let mut functions = Vec::new();
    for pin in cell.pins {
        let pin_name = pin.name.ok_or_else(|| LibraryError::MissingField {
            field: "name",
            context: format!("a pin of gate type '{name}'"),
        })?;
        let direction = pin
            .direction
            .ok_or_else(|| LibraryError::MissingField {
                field: "direction",
                context: format!("pin '{pin_name}' of gate type '{name}'"),
            })?
            .parse()
            .map_err(unknown)?;
        let pin_type = match pin.pin_type {
            Some(t) => t.parse().map_err(unknown)?,
            None => PinType::None,
        };
        if !gate_type.add_pin(PinDef::new(pin_name.clone(), direction, pin_type)) {
            return Err(invalid(format!("duplicate pin '{pin_name}'")));
        }

        if let Some(f) = pin.function {
            functions.push((pin_name.clone(), f));
        }
        if let Some(f) = pin.x_function {
            functions.push((format!("{pin_name}_undefined"), f));
        }
        if let Some(f) = pin.z_function {
            functions.push((format!("{pin_name}_tristate"), f));
        }
    }

    for group in cell.groups {
        let group_name = group.name.ok_or_else(|| LibraryError::MissingField {
            field: "name",
            context: format!("a pin group of gate type '{name}'"),
        })?;
        let entries = group.pins.ok_or_else(|| LibraryError::MissingField {
            field: "pins",
            context: format!("pin group '{group_name}' of gate type '{name}'"),
        })?;

        let mut pins = Vec::with_capacity(entries.len());
        for entry in entries {
            let (index, pin) = entry
                .into_iter()
                .next()
                .ok_or_else(|| invalid(format!("empty pin assignment in group '{group_name}'")))?;
            let index: u32 = index.parse().map_err(|_| {
                invalid(format!("pin index '{index}' in group '{group_name}' is not a number"))
            })?;
            pins.push((index, pin));
        }
        if !gate_type.assign_pin_group(group_name.clone(), pins) {
            return Err(invalid(format!(
                "pin group '{group_name}' is duplicated or names an unknown pin"
            )));
        }
    }

    if gate_type.has_property(GateTypeProperty::Lut) {
        let config = cell
            .lut_config
            .ok_or_else(|| invalid("LUT gate type without 'lut_config'".to_string()))?;
        gate_type.set_lut_config(lut_config(&name, config)?);
    } else if gate_type.has_property(GateTypeProperty::Ff) {
        let config = cell
            .ff_config
            .ok_or_else(|| invalid("flip-flop gate type without 'ff_config'".to_string()))?;
        for (function, expr) in [
            ("next_state", config.next_state.as_ref()),
            ("clock", config.clocked_on.as_ref()),
            ("clear", config.clear_on.as_ref()),
            ("preset", config.preset_on.as_ref()),
        ] {
            if let Some(expr) = expr {
                functions.push((function.to_string(), expr.clone()));
            }
        }
        gate_type.set_sequential_config(sequential_config(&name, config)?);
    } else if gate_type.has_property(GateTypeProperty::Latch) {
        let config = cell
            .latch_config
            .ok_or_else(|| invalid("latch gate type without 'latch_config'".to_string()))?;
        for (function, expr) in [
            ("data", config.data_in.as_ref()),
            ("enable", config.enable_on.as_ref()),
            ("clear", config.clear_on.as_ref()),
            ("preset", config.preset_on.as_ref()),
        ] {
            if let Some(expr) = expr {
                functions.push((function.to_string(), expr.clone()));
            }
        }
        gate_type.set_sequential_config(sequential_config(&name, config)?);
    }

    for (function, expr) in functions {
        gate_type.add_boolean_function(function, expr);
    }
    Ok(gate_type)
}

fn lut_config(cell: &str, raw: RawLutConfig) -> Result<LutConfig, LibraryError> {
    let missing = |field: &'static str| LibraryError::MissingField {
        field,
        context: format!("LUT config of gate type '{cell}'"),
    };
    let bit_order = raw.bit_order.ok_or_else(|| missing("bit_order"))?;
    Ok(LutConfig {
        ascending: bit_order == "ascending",
        data_category: raw.data_category.ok_or_else(|| missing("data_category"))?,
        data_identifier: raw.data_identifier.ok_or_else(|| missing("data_identifier"))?,
    })
}

fn sequential_config(
    cell: &str,
    raw: RawSequentialConfig,
) -> Result<SequentialConfig, LibraryError> {
    let clear_preset = match (raw.state_clear_preset, raw.neg_state_clear_preset) {
        (Some(state), Some(neg_state)) => Some((
            clear_preset_behavior(cell, &state)?,
            clear_preset_behavior(cell, &neg_state)?,
        )),
        (None, None) => None,
        _ => {
            return Err(LibraryError::InvalidCell {
                cell: cell.to_string(),
                message: "clear/preset behavior must be given for both the state \
                          and the negated state"
                    .to_string(),
            })
        }
    };
    Ok(SequentialConfig {
        clear_preset,
        data_category: raw.data_category,
        data_identifier: raw.data_identifier,
    })
}

fn clear_preset_behavior(cell: &str, text: &str) -> Result<ClearPresetBehavior, LibraryError> {
    match text.parse::<ClearPresetBehavior>() {
        Ok(ClearPresetBehavior::Undefined) | Err(_) => Err(LibraryError::InvalidCell {
            cell: cell.to_string(),
            message: format!("invalid clear/preset behavior '{text}'"),
        }),
        Ok(behavior) => Ok(behavior),
    }
}
