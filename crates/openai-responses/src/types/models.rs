//! Model resource and the built-in model table.

use serde::{Deserialize, Serialize};

/// A model that can be used with the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub created: i64,
    pub object: String,
    pub owned_by: String,
}

impl Model {
    pub fn new(id: impl Into<String>, created: i64, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created,
            object: "model".to_string(),
            owned_by: owned_by.into(),
        }
    }
}

/// A row of the built-in model table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemModel {
    pub id: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

impl From<&SystemModel> for Model {
    fn from(m: &SystemModel) -> Self {
        Model::new(m.id, m.created, m.owned_by)
    }
}

/// Models every fresh model store is seeded with unless told otherwise.
pub const SYSTEM_MODELS: &[SystemModel] = &[
    SystemModel {
        id: "dall-e-3",
        created: 1698785189,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4-1106-preview",
        created: 1698957206,
        owned_by: "system",
    },
    SystemModel {
        id: "whisper-1",
        created: 1677532384,
        owned_by: "openai-internal",
    },
    SystemModel {
        id: "davinci-002",
        created: 1692634301,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4-turbo-preview",
        created: 1706037777,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4-0125-preview",
        created: 1706037612,
        owned_by: "system",
    },
    SystemModel {
        id: "babbage-002",
        created: 1692634615,
        owned_by: "system",
    },
    SystemModel {
        id: "dall-e-2",
        created: 1698798177,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-3.5-turbo-16k",
        created: 1683758102,
        owned_by: "openai-internal",
    },
    SystemModel {
        id: "tts-1-hd-1106",
        created: 1699053533,
        owned_by: "system",
    },
    SystemModel {
        id: "tts-1-hd",
        created: 1699046015,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4",
        created: 1687882411,
        owned_by: "openai",
    },
    SystemModel {
        id: "gpt-4-0613",
        created: 1686588896,
        owned_by: "openai",
    },
    SystemModel {
        id: "gpt-3.5-turbo-1106",
        created: 1698959748,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-3.5-turbo-instruct-0914",
        created: 1694122472,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-3.5-turbo-instruct",
        created: 1692901427,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4-32k",
        created: 1687979321,
        owned_by: "openai",
    },
    SystemModel {
        id: "tts-1",
        created: 1681940951,
        owned_by: "openai-internal",
    },
    SystemModel {
        id: "gpt-4-32k-0613",
        created: 1686614047,
        owned_by: "openai",
    },
    SystemModel {
        id: "gpt-3.5-turbo-0301",
        created: 1677649963,
        owned_by: "openai",
    },
    SystemModel {
        id: "gpt-3.5-turbo-0125",
        created: 1706048358,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-3.5-turbo",
        created: 1677610602,
        owned_by: "openai",
    },
    SystemModel {
        id: "tts-1-1106",
        created: 1699053241,
        owned_by: "system",
    },
    SystemModel {
        id: "text-embedding-3-large",
        created: 1705953180,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4-turbo-2024-04-09",
        created: 1712601677,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4-turbo",
        created: 1712361441,
        owned_by: "system",
    },
    SystemModel {
        id: "text-embedding-3-small",
        created: 1705948997,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-3.5-turbo-0613",
        created: 1686587434,
        owned_by: "openai",
    },
    SystemModel {
        id: "text-embedding-ada-002",
        created: 1671217299,
        owned_by: "openai-internal",
    },
    SystemModel {
        id: "gpt-4-1106-vision-preview",
        created: 1711473033,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4-vision-preview",
        created: 1698894917,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-3.5-turbo-16k-0613",
        created: 1685474247,
        owned_by: "openai",
    },
    SystemModel {
        id: "gpt-4o",
        created: 1715367049,
        owned_by: "system",
    },
    SystemModel {
        id: "gpt-4o-2024-05-13",
        created: 1715368132,
        owned_by: "system",
    },
];

/// The built-in table as owned models.
pub fn system_models() -> Vec<Model> {
    SYSTEM_MODELS.iter().map(Model::from).collect()
}
