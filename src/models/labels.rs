use crate::Result;
use std::path::Path;

/// 类别索引 -> 名称
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// 解析 Ultralytics 导出时写入的 `names` 元数据，例如 `{0: 'fracture', 1: 'text'}`
    pub fn from_metadata(raw: &str) -> Option<Self> {
        let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;

        let mut entries: Vec<(usize, String)> = Vec::new();
        for entry in split_entries(body) {
            let (index, name) = entry.split_once(':')?;
            let index = index.trim().parse::<usize>().ok()?;
            let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
            entries.push((index, name.to_string()));
        }

        if entries.is_empty() {
            return None;
        }

        let len = entries.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        let mut names: Vec<String> = (0..len).map(fallback_name).collect();
        for (index, name) in entries {
            names[index] = name;
        }

        Some(Self { names })
    }

    /// 每行一个类别名称，空行忽略
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let names = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self { names })
    }

    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| fallback_name(class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn fallback_name(class_id: usize) -> String {
    format!("class_{}", class_id)
}

/// 按顶层逗号切分，忽略引号内的逗号
fn split_entries(body: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, ',') => {
                entries.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    let tail = &body[start..];
    if !tail.trim().is_empty() {
        entries.push(tail);
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ultralytics_names() {
        let map = LabelMap::from_metadata(
            "{0: 'boneanomaly', 1: 'bonelesion', 2: 'foreignbody', 3: 'fracture'}",
        )
        .unwrap();

        assert_eq!(map.len(), 4);
        assert_eq!(map.name(3), "fracture");
        assert_eq!(map.name(0), "boneanomaly");
    }

    #[test]
    fn quoted_commas_survive() {
        let map = LabelMap::from_metadata("{0: 'fracture, displaced', 1: \"text\"}").unwrap();
        assert_eq!(map.name(0), "fracture, displaced");
        assert_eq!(map.name(1), "text");
    }

    #[test]
    fn sparse_indices_get_fallback_names() {
        let map = LabelMap::from_metadata("{2: 'fracture'}").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.name(0), "class_0");
        assert_eq!(map.name(2), "fracture");
    }

    #[test]
    fn malformed_metadata_is_rejected() {
        assert!(LabelMap::from_metadata("fracture").is_none());
        assert!(LabelMap::from_metadata("{}").is_none());
        assert!(LabelMap::from_metadata("{x: 'fracture'}").is_none());
    }

    #[test]
    fn unknown_index_falls_back() {
        let map = LabelMap::new(vec!["fracture".to_string()]);
        assert_eq!(map.name(7), "class_7");
    }

    #[test]
    fn reads_labels_file() {
        let path = std::env::temp_dir().join(format!("labels-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "boneanomaly\n\nfracture\n").unwrap();

        let map = LabelMap::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(map.names(), &["boneanomaly".to_string(), "fracture".to_string()]);
    }
}
