//! The boundary between the pipeline and the language model.
//!
//! A [`Model`] answers a prompt on behalf of a [`Role`] and returns a
//! [`Response`] whose payload is untrusted. Payloads are checked against the
//! expected [`Shape`] as soon as they arrive; business logic only ever sees
//! [`Parsed::Valid`].

pub mod chat;
pub mod roles;

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::Usage;

/// A structured output the model is asked to produce.
pub trait Shape: DeserializeOwned {
    /// Name the shape is advertised under in the system prompt.
    const NAME: &'static str;

    /// JSON schema describing the expected object.
    fn schema() -> Value;

    /// Content checks that go beyond the field set.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Identity, behaviour and expected output of one agent.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    name: String,
    description: String,
    instructions: Vec<String>,
    output_name: String,
    output_schema: Value,
}

impl Role {
    pub fn new<T: Shape>(name: &str, description: &str, instructions: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            instructions: instructions.iter().map(|s| (*s).to_owned()).collect(),
            output_name: T::NAME.to_owned(),
            output_schema: T::schema(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn output_schema(&self) -> &Value {
        &self.output_schema
    }
}

/// What came back from one model call.
#[derive(Debug, Clone, Default)]
pub struct Response {
    payload: Option<Value>,
    usage: Usage,
}

impl Response {
    pub fn new(payload: Option<Value>) -> Self {
        Self {
            payload,
            usage: Usage::default(),
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Check the payload against `T`, rejecting anything that does not fit.
    pub fn parse<T: Shape>(&self) -> Parsed<T> {
        let Some(payload) = &self.payload else {
            return Parsed::Missing;
        };

        match serde_json::from_value::<T>(payload.clone()) {
            Ok(value) => match value.check() {
                Ok(()) => Parsed::Valid(value),
                Err(reason) => Parsed::Malformed(reason),
            },
            Err(e) => Parsed::Malformed(e.to_string()),
        }
    }
}

/// Outcome of checking a payload against its expected shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Valid(T),
    Missing,
    Malformed(String),
}

impl<T> Parsed<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Parsed::Valid(value) => Some(value),
            Parsed::Missing | Parsed::Malformed(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Parsed::Valid(_))
    }

    /// Human-readable reason for a rejected payload.
    pub fn describe(&self) -> String {
        match self {
            Parsed::Valid(_) => "valid".to_string(),
            Parsed::Missing => "no structured payload".to_string(),
            Parsed::Malformed(reason) => format!("malformed payload: {reason}"),
        }
    }
}

pub trait Model {
    /// Ask the model to answer `prompt` as `role`. Blocks until the full
    /// response is available.
    fn invoke(&self, role: &Role, prompt: &str) -> Result<Response>;
}

impl<M: Model + ?Sized> Model for &M {
    fn invoke(&self, role: &Role, prompt: &str) -> Result<Response> {
        (**self).invoke(role, prompt)
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn invoke(&self, role: &Role, prompt: &str) -> Result<Response> {
        (**self).invoke(role, prompt)
    }
}
