//! Catalogue of generation models the benchmark knows how to address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A known generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmModel {
    #[serde(rename = "gpt-3.5-turbo-0125")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "llama-2-7b-chat")]
    Llama2_7bChat,
    #[serde(rename = "llama-3-8b")]
    Llama3_8b,
    #[serde(rename = "llama-3-70b")]
    Llama3_70b,
    #[serde(rename = "gemma-7b")]
    Gemma7b,
    #[serde(rename = "llama-3.1-8b")]
    Llama31_8b,
    #[serde(rename = "llama-3.2-3b")]
    Llama32_3b,
    #[serde(rename = "mistral-7b")]
    Mistral7b,
    #[serde(rename = "kuchiki-l2-7b")]
    KuchikiL2_7b,
    #[serde(rename = "tinyllama-1.1b-chat")]
    TinyLlama1_1bChat,
    #[serde(rename = "biomistral-7b")]
    BioMistral7b,
    #[serde(rename = "qwen2.5-3b-instruct")]
    Qwen25_3bInstruct,
    #[serde(rename = "airoboros-3b")]
    Airoboros3b,
    #[serde(rename = "medicine-chat")]
    MedicineChat,
    #[serde(rename = "medicine-llm-13b")]
    MedicineLlm13b,
    #[serde(rename = "med-llama-3-8b-v1")]
    MedLlama3_8bV1,
    #[serde(rename = "med-llama-3-8b-v2")]
    MedLlama3_8bV2,
    #[serde(rename = "med-llama-3-8b-v3")]
    MedLlama3_8bV3,
    #[serde(rename = "med-llama-3-8b-v4")]
    MedLlama3_8bV4,
}

impl LlmModel {
    /// Every catalogued model, in catalogue order.
    pub const ALL: [LlmModel; 20] = [
        LlmModel::Gpt35Turbo,
        LlmModel::Gpt4,
        LlmModel::Llama2_7bChat,
        LlmModel::Llama3_8b,
        LlmModel::Llama3_70b,
        LlmModel::Gemma7b,
        LlmModel::Llama31_8b,
        LlmModel::Llama32_3b,
        LlmModel::Mistral7b,
        LlmModel::KuchikiL2_7b,
        LlmModel::TinyLlama1_1bChat,
        LlmModel::BioMistral7b,
        LlmModel::Qwen25_3bInstruct,
        LlmModel::Airoboros3b,
        LlmModel::MedicineChat,
        LlmModel::MedicineLlm13b,
        LlmModel::MedLlama3_8bV1,
        LlmModel::MedLlama3_8bV2,
        LlmModel::MedLlama3_8bV3,
        LlmModel::MedLlama3_8bV4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmModel::Gpt35Turbo => "gpt-3.5-turbo-0125",
            LlmModel::Gpt4 => "gpt-4",
            LlmModel::Llama2_7bChat => "llama-2-7b-chat",
            LlmModel::Llama3_8b => "llama-3-8b",
            LlmModel::Llama3_70b => "llama-3-70b",
            LlmModel::Gemma7b => "gemma-7b",
            LlmModel::Llama31_8b => "llama-3.1-8b",
            LlmModel::Llama32_3b => "llama-3.2-3b",
            LlmModel::Mistral7b => "mistral-7b",
            LlmModel::KuchikiL2_7b => "kuchiki-l2-7b",
            LlmModel::TinyLlama1_1bChat => "tinyllama-1.1b-chat",
            LlmModel::BioMistral7b => "biomistral-7b",
            LlmModel::Qwen25_3bInstruct => "qwen2.5-3b-instruct",
            LlmModel::Airoboros3b => "airoboros-3b",
            LlmModel::MedicineChat => "medicine-chat",
            LlmModel::MedicineLlm13b => "medicine-llm-13b",
            LlmModel::MedLlama3_8bV1 => "med-llama-3-8b-v1",
            LlmModel::MedLlama3_8bV2 => "med-llama-3-8b-v2",
            LlmModel::MedLlama3_8bV3 => "med-llama-3-8b-v3",
            LlmModel::MedLlama3_8bV4 => "med-llama-3-8b-v4",
        }
    }

    /// End-of-turn marker the model's chat format expects, if any.
    pub fn eot_token(&self) -> Option<&'static str> {
        match self {
            LlmModel::Llama31_8b => Some("<|eot_id|>"),
            _ => None,
        }
    }
}

impl fmt::Display for LlmModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmModel {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LlmModel::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ProviderError::UnknownModel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for model in LlmModel::ALL {
            assert_eq!(model.as_str().parse::<LlmModel>().unwrap(), model);
        }
    }

    #[test]
    fn serde_names_match_as_str() {
        for model in LlmModel::ALL {
            let json = serde_json::to_string(&model).unwrap();
            assert_eq!(json, format!("\"{}\"", model.as_str()));
        }
    }

    #[test]
    fn only_llama_31_has_eot_token() {
        assert_eq!(LlmModel::Llama31_8b.eot_token(), Some("<|eot_id|>"));
        let with_token = LlmModel::ALL
            .iter()
            .filter(|m| m.eot_token().is_some())
            .count();
        assert_eq!(with_token, 1);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "gpt-5".parse::<LlmModel>().unwrap_err();
        assert!(matches!(err, ProviderError::UnknownModel(name) if name == "gpt-5"));
    }
}
