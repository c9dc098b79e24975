//! Gate types: the cell definitions a gate library offers.
//!
//! A gate type fixes the pin layout of every gate instantiated from it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::GateLibraryError;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident as $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// The textual form used in library and project files.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = GateLibraryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(GateLibraryError::UnknownVariant {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(de::Error::custom)
            }
        }
    };
}

string_enum! {
    /// Classification flags of a gate type.
    pub enum GateTypeProperty as "gate type property" {
        Combinational => "combinational",
        Sequential => "sequential",
        Power => "power",
        Ground => "ground",
        Lut => "lut",
        Ff => "ff",
        Latch => "latch",
        Ram => "ram",
        Io => "io",
        Dsp => "dsp",
        Mux => "mux",
        Buffer => "buffer",
        CarryChain => "c_carry",
    }
}

string_enum! {
    /// Signal direction of a pin.
    pub enum PinDirection as "pin direction" {
        Input => "input",
        Output => "output",
        InOut => "inout",
        Internal => "internal",
    }
}

string_enum! {
    /// Functional role of a pin.
    pub enum PinType as "pin type" {
        None => "none",
        Power => "power",
        Ground => "ground",
        Lut => "lut",
        State => "state",
        NegState => "neg_state",
        Clock => "clock",
        Enable => "enable",
        Set => "set",
        Reset => "reset",
        Data => "data",
        Address => "address",
        IoPad => "io_pad",
        Select => "select",
    }
}

string_enum! {
    /// Output behavior of a flip-flop or latch when clear and preset are both active.
    pub enum ClearPresetBehavior as "clear/preset behavior" {
        Low => "L",
        High => "H",
        Keep => "N",
        Toggle => "T",
        Undefined => "X",
    }
}

/// A named pin of a gate type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDef {
    pub name: String,
    pub direction: PinDirection,
    pub pin_type: PinType,
}

impl PinDef {
    pub fn new(name: impl Into<String>, direction: PinDirection, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            direction,
            pin_type,
        }
    }

    /// Input pin without a special role.
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(name, PinDirection::Input, PinType::None)
    }

    /// Output pin without a special role.
    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, PinDirection::Output, PinType::None)
    }
}

/// Configuration of a look-up-table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LutConfig {
    /// Whether the init string is read least-significant bit first.
    pub ascending: bool,
    pub data_category: String,
    pub data_identifier: String,
}

/// Configuration shared by flip-flops and latches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialConfig {
    /// Behavior of the state and negated state outputs when clear and preset collide.
    pub clear_preset: Option<(ClearPresetBehavior, ClearPresetBehavior)>,
    pub data_category: Option<String>,
    pub data_identifier: Option<String>,
}

/// A cell definition from a gate library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateType {
    name: String,
    properties: BTreeSet<GateTypeProperty>,
    pins: Vec<PinDef>,
    pin_groups: BTreeMap<String, Vec<(u32, String)>>,
    boolean_functions: BTreeMap<String, String>,
    lut_config: Option<LutConfig>,
    sequential_config: Option<SequentialConfig>,
}

impl GateType {
    /// Create a gate type with no pins and no properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeSet::new(),
            pins: Vec::new(),
            pin_groups: BTreeMap::new(),
            boolean_functions: BTreeMap::new(),
            lut_config: None,
            sequential_config: None,
        }
    }

    /// Add a property.
    pub fn with_property(mut self, property: GateTypeProperty) -> Self {
        self.properties.insert(property);
        self
    }

    /// Add a pin. A pin whose name is already taken is ignored.
    pub fn with_pin(mut self, pin: PinDef) -> Self {
        self.add_pin(pin);
        self
    }

    /// Attach a boolean function given as an expression string.
    pub fn with_boolean_function(
        mut self,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        self.add_boolean_function(name, expression);
        self
    }

    /// Add a pin; returns `false` if a pin with that name already exists.
    pub fn add_pin(&mut self, pin: PinDef) -> bool {
        if self.pin(&pin.name).is_some() {
            return false;
        }
        self.pins.push(pin);
        true
    }

    pub fn add_property(&mut self, property: GateTypeProperty) {
        self.properties.insert(property);
    }

    pub fn add_boolean_function(&mut self, name: impl Into<String>, expression: impl Into<String>) {
        self.boolean_functions.insert(name.into(), expression.into());
    }

    /// Group existing pins under `name` with explicit indices.
    ///
    /// Returns `false` if the group already exists or references an unknown pin.
    pub fn assign_pin_group(&mut self, name: impl Into<String>, pins: Vec<(u32, String)>) -> bool {
        let name = name.into();
        if self.pin_groups.contains_key(&name) || pins.iter().any(|(_, p)| self.pin(p).is_none()) {
            return false;
        }
        self.pin_groups.insert(name, pins);
        true
    }

    pub fn set_lut_config(&mut self, config: LutConfig) {
        self.lut_config = Some(config);
    }

    pub fn set_sequential_config(&mut self, config: SequentialConfig) {
        self.sequential_config = Some(config);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeSet<GateTypeProperty> {
        &self.properties
    }

    pub fn has_property(&self, property: GateTypeProperty) -> bool {
        self.properties.contains(&property)
    }

    /// All pins in declaration order.
    pub fn pins(&self) -> &[PinDef] {
        &self.pins
    }

    pub fn pin(&self, name: &str) -> Option<&PinDef> {
        self.pins.iter().find(|p| p.name == name)
    }

    /// Pins that can be driven by a net (`input` and `inout`).
    pub fn input_pins(&self) -> impl Iterator<Item = &PinDef> {
        self.pins
            .iter()
            .filter(|p| matches!(p.direction, PinDirection::Input | PinDirection::InOut))
    }

    /// Pins that can drive a net (`output` and `inout`).
    pub fn output_pins(&self) -> impl Iterator<Item = &PinDef> {
        self.pins
            .iter()
            .filter(|p| matches!(p.direction, PinDirection::Output | PinDirection::InOut))
    }

    /// Pins of a given functional role.
    pub fn pins_of_type(&self, pin_type: PinType) -> impl Iterator<Item = &PinDef> {
        self.pins.iter().filter(move |p| p.pin_type == pin_type)
    }

    pub fn pin_groups(&self) -> &BTreeMap<String, Vec<(u32, String)>> {
        &self.pin_groups
    }

    pub fn boolean_functions(&self) -> &BTreeMap<String, String> {
        &self.boolean_functions
    }

    pub fn boolean_function(&self, name: &str) -> Option<&str> {
        self.boolean_functions.get(name).map(String::as_str)
    }

    pub fn lut_config(&self) -> Option<&LutConfig> {
        self.lut_config.as_ref()
    }

    pub fn sequential_config(&self) -> Option<&SequentialConfig> {
        self.sequential_config.as_ref()
    }
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
