//! KServe v2 JSON wire schema.
//!
//! These types describe the on-the-wire shape a REST/gRPC-JSON gateway would
//! exchange with clients; binding an actual HTTP server to them is an
//! external collaborator's job (out of scope here, per spec §1). What lives
//! here is the data model and the conversions to/from the core
//! [`InferenceRequest`]/[`InferenceResponse`] types, which is the part an
//! adapter crate would actually depend on.

use crate::error::{Error, Result};
use crate::parameters::{Parameter, ParameterMap};
use crate::request::{InferenceRequest, InferenceResponse, RequestedOutput};
use crate::tensor::{InferenceTensor, TensorData};
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTensor {
    pub name: String,
    pub shape: Vec<i64>,
    pub datatype: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Value>,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRequestedOutput {
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonInferenceRequest {
    pub id: String,
    pub inputs: Vec<JsonTensor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<JsonRequestedOutput>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonInferenceResponse {
    pub id: String,
    pub model_name: String,
    pub outputs: Vec<JsonTensor>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Value>,
}

fn parameter_to_json(param: &Parameter) -> Value {
    match param {
        Parameter::Bool(v) => Value::Bool(*v),
        Parameter::Int32(v) => Value::from(*v),
        Parameter::Double(v) => Value::from(*v),
        Parameter::String(v) => Value::String(v.clone()),
    }
}

fn json_to_parameter(value: &Value) -> Result<Parameter> {
    match value {
        Value::Bool(v) => Ok(Parameter::Bool(*v)),
        Value::String(v) => Ok(Parameter::String(v.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Parameter::Int32(i32::try_from(i).map_err(|_| {
                    Error::invalid_argument("parameter integer out of i32 range")
                })?))
            } else if let Some(f) = n.as_f64() {
                Ok(Parameter::Double(f))
            } else {
                Err(Error::invalid_argument("unsupported numeric parameter"))
            }
        }
        other => Err(Error::invalid_argument(format!(
            "unsupported parameter value: {other}"
        ))),
    }
}

fn parameters_to_map(params: &HashMap<String, Value>) -> Result<ParameterMap> {
    let mut map = ParameterMap::new();
    for (key, value) in params {
        map.put(key.clone(), json_to_parameter(value)?);
    }
    Ok(map)
}

fn map_to_parameters(map: &ParameterMap) -> HashMap<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), parameter_to_json(v)))
        .collect()
}

fn element_to_bytes(datatype: DataType, value: &Value) -> Result<Vec<u8>> {
    let bad = || Error::invalid_argument(format!("value {value} does not match datatype {datatype}"));
    match datatype {
        DataType::Bool => Ok(vec![value.as_bool().ok_or_else(bad)? as u8]),
        DataType::U8 => Ok(vec![value.as_u64().ok_or_else(bad)? as u8]),
        DataType::U16 => Ok((value.as_u64().ok_or_else(bad)? as u16).to_le_bytes().to_vec()),
        DataType::U32 => Ok((value.as_u64().ok_or_else(bad)? as u32).to_le_bytes().to_vec()),
        DataType::U64 => Ok(value.as_u64().ok_or_else(bad)?.to_le_bytes().to_vec()),
        DataType::I8 => Ok(vec![value.as_i64().ok_or_else(bad)? as u8]),
        DataType::I16 => Ok((value.as_i64().ok_or_else(bad)? as i16).to_le_bytes().to_vec()),
        DataType::I32 => Ok((value.as_i64().ok_or_else(bad)? as i32).to_le_bytes().to_vec()),
        DataType::I64 => Ok(value.as_i64().ok_or_else(bad)?.to_le_bytes().to_vec()),
        DataType::F32 => Ok((value.as_f64().ok_or_else(bad)? as f32).to_le_bytes().to_vec()),
        DataType::F64 => Ok(value.as_f64().ok_or_else(bad)?.to_le_bytes().to_vec()),
        DataType::F16 => Err(Error::invalid_argument("FP16 JSON encoding is not supported")),
        DataType::String => {
            let s = value.as_str().ok_or_else(bad)?;
            let mut bytes = (s.len() as u32).to_le_bytes().to_vec();
            bytes.extend_from_slice(s.as_bytes());
            Ok(bytes)
        }
    }
}

fn bytes_to_element(datatype: DataType, bytes: &[u8]) -> Value {
    match datatype {
        DataType::Bool => Value::Bool(bytes[0] != 0),
        DataType::U8 => Value::from(bytes[0]),
        DataType::U16 => Value::from(u16::from_le_bytes(bytes.try_into().unwrap())),
        DataType::U32 => Value::from(u32::from_le_bytes(bytes.try_into().unwrap())),
        DataType::U64 => Value::from(u64::from_le_bytes(bytes.try_into().unwrap())),
        DataType::I8 => Value::from(bytes[0] as i8),
        DataType::I16 => Value::from(i16::from_le_bytes(bytes.try_into().unwrap())),
        DataType::I32 => Value::from(i32::from_le_bytes(bytes.try_into().unwrap())),
        DataType::I64 => Value::from(i64::from_le_bytes(bytes.try_into().unwrap())),
        DataType::F32 => Value::from(f32::from_le_bytes(bytes.try_into().unwrap()) as f64),
        DataType::F64 => Value::from(f64::from_le_bytes(bytes.try_into().unwrap())),
        DataType::F16 => Value::Null,
        DataType::String => Value::String(String::from_utf8_lossy(&bytes[4..]).into_owned()),
    }
}

impl JsonTensor {
    pub fn into_tensor(self) -> Result<InferenceTensor> {
        let datatype = DataType::from_str(&self.datatype)?;
        let mut bytes = Vec::new();
        for element in &self.data {
            bytes.extend(element_to_bytes(datatype, element)?);
        }
        let mut tensor = InferenceTensor::new(self.name, self.shape, datatype, TensorData::Owned(bytes));
        tensor.parameters = parameters_to_map(&self.parameters)?;
        Ok(tensor)
    }

    pub fn from_tensor(tensor: &InferenceTensor) -> Self {
        let bytes = tensor.data.as_bytes();
        let mut data = Vec::new();
        if tensor.datatype == DataType::String {
            let mut offset = 0;
            while offset < bytes.len() {
                let len = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
                data.push(bytes_to_element(DataType::String, &bytes[offset..offset + 4 + len]));
                offset += 4 + len;
            }
        } else {
            let width = tensor.datatype.size();
            for chunk in bytes.chunks(width) {
                data.push(bytes_to_element(tensor.datatype, chunk));
            }
        }

        JsonTensor {
            name: tensor.name.clone(),
            shape: tensor.shape.clone(),
            datatype: tensor.datatype.as_str().to_string(),
            parameters: map_to_parameters(&tensor.parameters),
            data,
        }
    }
}

impl JsonInferenceRequest {
    pub fn into_request(self, model: impl Into<String>) -> Result<InferenceRequest> {
        let mut request = InferenceRequest::new(self.id, model);
        for input in self.inputs {
            request.add_input_tensor(input.into_tensor()?);
        }
        for output in self.outputs {
            request.requested_outputs.push(RequestedOutput {
                name: output.name,
                parameters: parameters_to_map(&output.parameters)?,
            });
        }
        request.parameters = parameters_to_map(&self.parameters)?;
        Ok(request)
    }
}

impl JsonInferenceResponse {
    pub fn from_response(response: &InferenceResponse) -> Self {
        JsonInferenceResponse {
            id: response.id.clone(),
            model_name: response.model.clone(),
            outputs: response.outputs.iter().map(JsonTensor::from_tensor).collect(),
            parameters: map_to_parameters(&response.parameters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_tensor_round_trips_through_core_tensor() {
        let json = JsonTensor {
            name: "input".into(),
            shape: vec![1, 3],
            datatype: "INT32".into(),
            parameters: HashMap::new(),
            data: vec![Value::from(1), Value::from(2), Value::from(3)],
        };
        let tensor = json.clone().into_tensor().unwrap();
        assert_eq!(tensor.data.len(), 12);

        let back = JsonTensor::from_tensor(&tensor);
        assert_eq!(back.data, json.data);
    }

    #[test]
    fn json_request_carries_parameters_and_outputs() {
        let mut params = HashMap::new();
        params.insert("top_k".to_string(), Value::from(5));
        let request = JsonInferenceRequest {
            id: "req-1".into(),
            inputs: vec![],
            outputs: vec![JsonRequestedOutput {
                name: "logits".into(),
                parameters: HashMap::new(),
            }],
            parameters: params,
        };
        let core = request.into_request("echo").unwrap();
        assert_eq!(core.requested_outputs.len(), 1);
        assert_eq!(core.parameters.get_int32("top_k"), Some(5));
    }
}
