use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use super::error::Error;

pub type FormData = HashMap<String, Value>;

/// Dynamic JSON request body. The consuming server deserializes the body into
/// `FormData` and the typed getters pull fields out of it.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, Error>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| Error::invalid_request("Invalid type conversion")),
            None => Err(Error::invalid_request("Invalid key")),
        }
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, Error>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(Value::Number(n)) => n
                .to_string()
                .parse()
                .map_err(|_e| Error::invalid_request("Invalid type conversion")),
            Some(value) => match value.as_str() {
                Some(v) => v
                    .parse()
                    .map_err(|_e| Error::invalid_request("Invalid type conversion")),
                None => Err(Error::invalid_request("Failed to parse value as number")),
            },
            None => Err(Error::invalid_request("Invalid key")),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, Error> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(Error::invalid_request("Failed to parse value as string")),
            },
            None => Err(Error::invalid_request("Invalid key")),
        }
    }

    pub fn get_opt_str(&self, key: &str) -> Option<String> {
        self.inner
            .get(key)
            .and_then(|value| value.as_str())
            .map(|v| v.to_string())
    }

    pub fn get_array<T>(&self, key: &str) -> Result<Vec<T>, Error>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| {
                    T::try_from(value.to_owned())
                        .map_err(|_e| Error::invalid_request("Invalid type conversion"))
                })
                .collect(),
            Some(_) => Err(Error::invalid_request("Failed to parse value as array")),
            None => Err(Error::invalid_request("Invalid key")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> Form {
        Form::from_data(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn typed_getters() {
        let form = form(json!({
            "name": "Pancakes",
            "cooking_time": 20,
            "offset": "30",
        }));

        assert_eq!(form.get_str("name").unwrap(), "Pancakes");
        assert_eq!(form.get_number::<i32>("cooking_time").unwrap(), 20);
        assert_eq!(form.get_number::<i64>("offset").unwrap(), 30);
        assert!(form.get_str("missing").is_err());
        assert!(form.get_opt_str("missing").is_none());
    }

    #[test]
    fn array_getter_rejects_non_arrays() {
        let form = form(json!({ "tags": "breakfast" }));
        assert!(form.get_array::<Value>("tags").is_err());
    }
}
