//! snapshot: точечный срез коллекций, collection → (doc id → тело).
//!
//! - Коллекции упорядочены по имени (BTreeMap), документы: в порядке вставки
//!   (IndexMap), поэтому `into_items()` детерминирован: повторный restore одного и
//!   того же снапшота пишет документы в одном и том же порядке.
//! - `Snapshot<()>` (DocTree): «дерево существования» без тел документов.
//! - Фильтры include/exclude чистые: возвращают новый снапшот.

use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::store::join_path;
use crate::value::Document;

/// Единица батч-записи: полный путь + тело.
#[derive(Clone, Debug, PartialEq)]
pub struct DocItem {
    pub path: String,
    pub data: Document,
}

impl DocItem {
    pub fn new(path: impl Into<String>, data: Document) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<D = Document> {
    collections: BTreeMap<String, IndexMap<String, D>>,
}

/// Collection → document IDs, без значений.
pub type DocTree = Snapshot<()>;

impl<D> Default for Snapshot<D> {
    fn default() -> Self {
        Self {
            collections: BTreeMap::new(),
        }
    }
}

impl<D> Snapshot<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать коллекцию (в т.ч. пустую).
    pub fn ensure_collection(&mut self, collection: &str) -> &mut IndexMap<String, D> {
        self.collections.entry(collection.to_string()).or_default()
    }

    pub fn insert(&mut self, collection: &str, doc_id: &str, body: D) {
        self.ensure_collection(collection)
            .insert(doc_id.to_string(), body);
    }

    pub fn collection(&self, name: &str) -> Option<&IndexMap<String, D>> {
        self.collections.get(name)
    }

    pub fn collections(&self) -> impl Iterator<Item = (&String, &IndexMap<String, D>)> {
        self.collections.iter()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn doc_count(&self) -> usize {
        self.collections.values().map(|d| d.len()).sum()
    }

    /// Пустой = нет ни одной коллекции.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Дерево существования (только ID).
    pub fn tree(&self) -> DocTree {
        let mut t = DocTree::new();
        for (c, docs) in &self.collections {
            let entry = t.ensure_collection(c);
            for id in docs.keys() {
                entry.insert(id.clone(), ());
            }
        }
        t
    }
}

impl<D: Clone> Snapshot<D> {
    /// Только коллекции из `names`; неизвестные имена молча игнорируются.
    pub fn include_only(&self, names: &[String]) -> Self {
        Self {
            collections: self
                .collections
                .iter()
                .filter(|(c, _)| names.contains(*c))
                .map(|(c, d)| (c.clone(), d.clone()))
                .collect(),
        }
    }

    /// Все коллекции, кроме `names`.
    pub fn exclude(&self, names: &[String]) -> Self {
        Self {
            collections: self
                .collections
                .iter()
                .filter(|(c, _)| !names.contains(*c))
                .map(|(c, d)| (c.clone(), d.clone()))
                .collect(),
        }
    }

    /// include (если задан) → exclude. Exclude выигрывает при пересечении.
    pub fn select(&self, only: &[String], except: &[String]) -> Self {
        let included = if only.is_empty() {
            self.clone()
        } else {
            self.include_only(only)
        };
        if except.is_empty() {
            included
        } else {
            included.exclude(except)
        }
    }
}

impl Snapshot<Document> {
    /// Плоский список записей: коллекции по имени, документы в порядке вставки.
    pub fn into_items(self) -> Vec<DocItem> {
        let mut items = Vec::with_capacity(self.doc_count());
        for (c, docs) in self.collections {
            for (id, data) in docs {
                items.push(DocItem::new(join_path(&c, &id), data));
            }
        }
        items
    }
}

/// Нормализовать имена коллекций из CLI: значения повторяющегося флага и/или строки
/// через запятую → плоский список trimmed имён без пустых и дублей (порядок сохраняется).
pub fn parse_collection_names<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for v in values {
        for part in v.as_ref().split(',') {
            let name = part.trim();
            if !name.is_empty() && !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

/// Фильтр перечисления коллекций для Tree Dumper.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CollectionFilter {
    #[default]
    All,
    Only(Vec<String>),
}

impl CollectionFilter {
    /// Пустой список → All.
    pub fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() {
            CollectionFilter::All
        } else {
            CollectionFilter::Only(names)
        }
    }

    pub fn allows(&self, collection: &str) -> bool {
        match self {
            CollectionFilter::All => true,
            CollectionFilter::Only(names) => names.iter().any(|n| n == collection),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, CollectionFilter::All)
    }
}
