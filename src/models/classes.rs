use crate::utils::error::RecognitionError;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// ultralytics 导出的 `names` 元数据形如 `{0: '1000', 1: '10000'}`
static METADATA_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).expect("valid names pattern"));

/// 类别ID到标签的映射表
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassNames(BTreeMap<usize, String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum NamesFile {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl ClassNames {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).enumerate().collect())
    }

    /// 解析模型元数据中的 `names` 字段
    pub fn parse_metadata(raw: &str) -> Result<Self> {
        let mut names = BTreeMap::new();
        for caps in METADATA_ENTRY.captures_iter(raw) {
            let id = caps[1].parse::<usize>().map_err(|e| {
                RecognitionError::ModelLoad(format!("Invalid class id '{}': {}", &caps[1], e))
            })?;
            names.insert(id, caps[2].to_string());
        }

        if names.is_empty() {
            return Err(RecognitionError::ModelLoad(format!(
                "No class names found in model metadata: {}",
                raw
            )));
        }
        Ok(Self(names))
    }

    /// 从 JSON 文件读取，支持数组或 `{"0": "1000"}` 对象
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let names = match serde_json::from_str::<NamesFile>(content)? {
            NamesFile::List(labels) => Self::from_labels(labels),
            NamesFile::Map(map) => {
                let mut names = BTreeMap::new();
                for (key, label) in map {
                    let id = key.trim().parse::<usize>().map_err(|e| {
                        RecognitionError::Config(format!("Invalid class id '{}': {}", key, e))
                    })?;
                    names.insert(id, label);
                }
                Self(names)
            }
        };

        if names.is_empty() {
            return Err(RecognitionError::Config("Class names file is empty".to_string()));
        }
        Ok(names)
    }

    /// 查找标签，未知ID返回 `class_<id>`
    pub fn label(&self, class_id: usize) -> String {
        self.0
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    /// 按ID顺序列出所有标签
    pub fn labels(&self) -> Vec<String> {
        self.0.values().cloned().collect()
    }

    /// 模型输出的类别数（最大ID + 1）
    pub fn num_classes(&self) -> usize {
        self.0.keys().next_back().map_or(0, |max| max + 1)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
