use anyhow::{Context, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A JSON object assembled from, and parsed into, [TypedParameters](TypedParameter).
///
/// The outbound request payload is built this way so that optional and legacy mirror fields can
/// be layered on top of defaults without a struct per protocol revision.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UntypedObject(pub(crate) Map<String, Json>);

/// A strongly typed entry of an [UntypedObject].
pub trait TypedParameter:
    TryFrom<Json, Error = anyhow::Error> + TryInto<Json> + Clone + std::fmt::Debug
{
    const KEY: &'static str;
}

impl UntypedObject {
    /// Get a [TypedParameter] from the Object.
    ///
    /// Note that this method clones the underlying data.
    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        Some(self.0.get(T::KEY)?.clone().try_into())
    }

    /// Insert a [TypedParameter], replacing any previous value under the same key.
    ///
    /// # Errors
    /// Returns an error if the parameter could not be converted to JSON.
    pub fn insert<T: TypedParameter>(&mut self, t: T) -> Result<()> {
        let value = t
            .try_into()
            .map_err(|_| Error::msg(format!("failed to encode '{}'", T::KEY)))?;
        self.0.insert(T::KEY.to_owned(), value);
        Ok(())
    }
}

impl From<UntypedObject> for Json {
    fn from(value: UntypedObject) -> Self {
        value.0.into()
    }
}

impl TryFrom<Json> for UntypedObject {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        match value {
            Json::Object(map) => Ok(Self(map)),
            other => Err(Error::msg(format!("expected a JSON object, found {other}"))),
        }
    }
}

pub trait ParsingErrorContext {
    type T: TypedParameter;

    fn parsing_error(self) -> Result<Self::T>;
}

impl<T: TypedParameter> ParsingErrorContext for Option<Result<T>> {
    type T = T;

    fn parsing_error(self) -> Result<T> {
        self.context(format!("'{}' is missing", T::KEY))?
            .context(format!("'{}' could not be parsed", T::KEY))
    }
}

/// Implements [TypedParameter] for a newtype whose inner value is (de)serialized with serde.
macro_rules! serde_parameter {
    ($(#[$meta:meta])* $name:ident($inner:ty) => $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(pub $inner);

        impl $crate::core::object::TypedParameter for $name {
            const KEY: &'static str = $key;
        }

        impl TryFrom<serde_json::Value> for $name {
            type Error = anyhow::Error;

            fn try_from(value: serde_json::Value) -> anyhow::Result<Self> {
                Ok(Self(serde_json::from_value(value)?))
            }
        }

        impl TryFrom<$name> for serde_json::Value {
            type Error = serde_json::Error;

            fn try_from(value: $name) -> std::result::Result<Self, Self::Error> {
                serde_json::to_value(value.0)
            }
        }
    };
}

pub(crate) use serde_parameter;

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    serde_parameter!(Answer(u64) => "answer");

    #[test]
    fn insert_and_get() {
        let mut object = UntypedObject::default();
        assert!(object.get::<Answer>().parsing_error().is_err());

        object.insert(Answer(42)).unwrap();
        assert_eq!(object.get::<Answer>().unwrap().unwrap(), Answer(42));

        object.insert(Answer(7)).unwrap();
        assert_eq!(object.get::<Answer>().parsing_error().unwrap(), Answer(7));
        assert_eq!(Json::from(object), json!({"answer": 7}));
    }

    #[test]
    fn unparsable_entry() {
        let object = UntypedObject::try_from(json!({"answer": "forty-two"})).unwrap();
        assert!(object.get::<Answer>().parsing_error().is_err());
        assert!(UntypedObject::try_from(json!([1])).is_err());
    }
}
