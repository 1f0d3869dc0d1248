//! Circuit input assembly
//!
//! Inputs and public signals travel as snarkjs JSON: every field element is
//! a decimal string, arrays are JSON arrays. Byte strings checked by the
//! SHA-256 gadget inside the circuits are passed as bit arrays, bytes in
//! order and the most significant bit of each byte first.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use umbra_shielded::field::{self, FieldElement};

/// A single named circuit input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Field(FieldElement),
    Array(Vec<FieldElement>),
}

impl Serialize for InputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputValue::Field(f) => serializer.serialize_str(&field::to_decimal(f)),
            InputValue::Array(values) => {
                serializer.collect_seq(values.iter().map(field::to_decimal))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for InputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawValue::deserialize(deserializer)? {
            RawValue::One(s) => field::from_decimal(&s)
                .map(InputValue::Field)
                .map_err(D::Error::custom),
            RawValue::Many(values) => values
                .iter()
                .map(|s| field::from_decimal(s))
                .collect::<Result<Vec<_>, _>>()
                .map(InputValue::Array)
                .map_err(D::Error::custom),
        }
    }
}

/// Named inputs of one proof, public and private together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitInputs(BTreeMap<String, InputValue>);

impl CircuitInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_field(&mut self, name: &str, value: FieldElement) -> &mut Self {
        self.0.insert(name.to_string(), InputValue::Field(value));
        self
    }

    pub fn insert_array(&mut self, name: &str, values: Vec<FieldElement>) -> &mut Self {
        self.0.insert(name.to_string(), InputValue::Array(values));
        self
    }

    /// Insert a byte string as its bit decomposition
    pub fn insert_bits(&mut self, name: &str, bytes: &[u8]) -> &mut Self {
        self.insert_array(name, bytes_to_bits(bytes))
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.0.get(name)
    }

    pub fn field(&self, name: &str) -> Option<FieldElement> {
        match self.0.get(name)? {
            InputValue::Field(f) => Some(*f),
            InputValue::Array(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Bits of `bytes`, most significant bit of each byte first
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<FieldElement> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |i| FieldElement::from((*byte >> i) & 1)))
        .collect()
}

/// Public signals of a proof, in circuit order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicSignals(pub Vec<FieldElement>);

impl PublicSignals {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[FieldElement] {
        &self.0
    }

    /// 32-byte big-endian words, as passed to an on-chain verifier
    pub fn to_words(&self) -> Vec<[u8; 32]> {
        self.0.iter().map(field::to_be_bytes).collect()
    }
}

impl Serialize for PublicSignals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(field::to_decimal))
    }
}

impl<'de> Deserialize<'de> for PublicSignals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| field::from_decimal(s))
            .collect::<Result<Vec<_>, _>>()
            .map(PublicSignals)
            .map_err(D::Error::custom)
    }
}

impl From<Vec<FieldElement>> for PublicSignals {
    fn from(values: Vec<FieldElement>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn test_bits_msb_first() {
        let bits = bytes_to_bits(&[0b1000_0001, 0x02]);
        let expected: Vec<Fr> = [1u64, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0]
            .into_iter()
            .map(Fr::from)
            .collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_inputs_json_shape() {
        let mut inputs = CircuitInputs::new();
        inputs
            .insert_field("amount", Fr::from(1000u64))
            .insert_array("pathIndices", vec![Fr::from(1u64), Fr::from(0u64)])
            .insert_bits("randomP", &[0xff]);

        let value: serde_json::Value = serde_json::from_str(&inputs.to_json().unwrap()).unwrap();
        assert_eq!(value["amount"], "1000");
        assert_eq!(value["pathIndices"], serde_json::json!(["1", "0"]));
        assert_eq!(value["randomP"].as_array().unwrap().len(), 8);

        let back: CircuitInputs = serde_json::from_value(value).unwrap();
        assert_eq!(back, inputs);
        assert_eq!(back.field("amount"), Some(Fr::from(1000u64)));
        assert_eq!(back.field("pathIndices"), None);
    }

    #[test]
    fn test_public_signals_reject_out_of_field() {
        let ok: PublicSignals = serde_json::from_str(r#"["1", "2", "3"]"#).unwrap();
        assert_eq!(ok.0, vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)]);
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"["1","2","3"]"#);

        let json = format!(r#"["{}"]"#, umbra_shielded::FIELD_SIZE);
        assert!(serde_json::from_str::<PublicSignals>(&json).is_err());
    }

    #[test]
    fn test_words_big_endian() {
        let signals = PublicSignals(vec![Fr::from(0x0102u64)]);
        let words = signals.to_words();
        assert_eq!(words[0][30..], [0x01, 0x02]);
        assert!(words[0][..30].iter().all(|b| *b == 0));
    }
}
