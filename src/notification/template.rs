//! 通知模板 - 命名的默认展示属性
//!
//! 模板保存在 `~/.config/ha-notifier/templates.json`，写入时持有独占文件锁。
//! 事件通过 `template_id` / `template_name` 引用模板，见 [`TemplateResolver`]。

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::channel::Priority;

/// 已保存的模板
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub popup: bool,
    #[serde(default)]
    pub require_ack: bool,
}

/// 待插入的模板（id 由存储分配）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTemplate {
    pub name: String,
    pub priority: Priority,
    pub persistent: bool,
    pub popup: bool,
    pub require_ack: bool,
}

impl NewTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn with_id(self, id: i64) -> Template {
        Template {
            id,
            name: self.name,
            priority: self.priority,
            persistent: self.persistent,
            popup: self.popup,
            require_ack: self.require_ack,
        }
    }
}

/// 模板存储接口
pub trait TemplateStore: Send + Sync {
    fn get(&self, id: i64) -> Result<Option<Template>>;

    fn by_name(&self, name: &str) -> Result<Option<Template>>;

    /// 全部模板，按名称排序
    fn all(&self) -> Result<Vec<Template>>;

    fn insert(&self, template: NewTemplate) -> Result<i64>;

    fn update(&self, template: &Template) -> Result<()>;

    fn delete(&self, id: i64) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TemplateFile {
    #[serde(default = "first_id")]
    next_id: i64,
    #[serde(default)]
    templates: Vec<Template>,
}

fn first_id() -> i64 {
    1
}

/// JSON 文件模板存储
pub struct JsonTemplateStore {
    path: PathBuf,
}

impl JsonTemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn read_file(&self) -> Result<TemplateFile> {
        if !self.path.exists() {
            return Ok(TemplateFile {
                next_id: first_id(),
                templates: Vec::new(),
            });
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(TemplateFile {
                next_id: first_id(),
                templates: Vec::new(),
            });
        }
        let file: TemplateFile = serde_json::from_str(&content)
            .with_context(|| format!("Invalid template file {}", self.path.display()))?;
        Ok(file)
    }

    fn write_file(&self, file: &TemplateFile) -> Result<()> {
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(file)?)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// 在独占锁内读取-修改-写回
    fn modify<T>(&self, f: impl FnOnce(&mut TemplateFile) -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.read_file().and_then(|mut file| {
            let value = f(&mut file)?;
            self.write_file(&file)?;
            Ok(value)
        });

        lock.unlock()?;
        result
    }

    fn snapshot(&self) -> Result<Vec<Template>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        // 读也加共享锁，避免读到一半被替换
        let lock = match File::open(self.lock_path()) {
            Ok(lock) => Some(lock),
            Err(_) => None,
        };
        if let Some(lock) = &lock {
            lock.lock_shared()?;
        }
        let result = self.read_file().map(|file| file.templates);
        if let Some(lock) = &lock {
            lock.unlock()?;
        }
        result
    }
}

impl TemplateStore for JsonTemplateStore {
    fn get(&self, id: i64) -> Result<Option<Template>> {
        Ok(self.snapshot()?.into_iter().find(|t| t.id == id))
    }

    fn by_name(&self, name: &str) -> Result<Option<Template>> {
        Ok(self.snapshot()?.into_iter().find(|t| t.name == name))
    }

    fn all(&self) -> Result<Vec<Template>> {
        let mut templates = self.snapshot()?;
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    fn insert(&self, template: NewTemplate) -> Result<i64> {
        if template.name.trim().is_empty() {
            return Err(anyhow!("Template name must not be empty"));
        }
        self.modify(|file| {
            let id = file.next_id.max(first_id());
            file.next_id = id + 1;
            file.templates.push(template.with_id(id));
            debug!(id, "Template inserted");
            Ok(id)
        })
    }

    fn update(&self, template: &Template) -> Result<()> {
        self.modify(|file| {
            let slot = file
                .templates
                .iter_mut()
                .find(|t| t.id == template.id)
                .ok_or_else(|| anyhow!("Template {} not found", template.id))?;
            *slot = template.clone();
            Ok(())
        })
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.modify(|file| {
            let before = file.templates.len();
            file.templates.retain(|t| t.id != id);
            if file.templates.len() == before {
                return Err(anyhow!("Template {} not found", id));
            }
            Ok(())
        })
    }
}

/// 按 id 或名称解析模板
///
/// id 优先于名称；每次解析只查一次存储，不缓存。存储错误按“未找到”处理。
#[derive(Clone)]
pub struct TemplateResolver {
    store: Arc<dyn TemplateStore>,
}

impl TemplateResolver {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    pub fn resolve(&self, id: Option<i64>, name: Option<&str>) -> Option<Template> {
        let lookup = match (id, name) {
            (Some(id), _) => self.store.get(id),
            (None, Some(name)) => self.store.by_name(name),
            (None, None) => return None,
        };
        match lookup {
            Ok(found) => {
                if found.is_none() {
                    debug!(?id, ?name, "Template not found");
                }
                found
            }
            Err(e) => {
                warn!(?id, ?name, error = %e, "Template lookup failed, treating as not found");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> JsonTemplateStore {
        JsonTemplateStore::new(dir.path().join("templates.json"))
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let a = store.insert(NewTemplate::new("alarm")).unwrap();
        let b = store.insert(NewTemplate::new("door")).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let a = store.insert(NewTemplate::new("a")).unwrap();
        store.delete(a).unwrap();
        let b = store.insert(NewTemplate::new("b")).unwrap();
        assert_eq!(b, 2);
        assert!(store.get(a).unwrap().is_none());
    }

    #[test]
    fn test_all_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.insert(NewTemplate::new("zeta")).unwrap();
        store.insert(NewTemplate::new("alpha")).unwrap();
        let names: Vec<String> = store.all().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_update_and_lookup_by_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id = store.insert(NewTemplate::new("alarm")).unwrap();
        let mut template = store.get(id).unwrap().unwrap();
        template.priority = Priority::Critical;
        template.popup = true;
        store.update(&template).unwrap();

        let loaded = store.by_name("alarm").unwrap().unwrap();
        assert_eq!(loaded.priority, Priority::Critical);
        assert!(loaded.popup);
    }

    #[test]
    fn test_unknown_id_is_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let ghost = Template {
            id: 99,
            name: "ghost".to_string(),
            priority: Priority::Info,
            persistent: false,
            popup: false,
            require_ack: false,
        };
        assert!(store.update(&ghost).is_err());
        assert!(store.delete(99).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.insert(NewTemplate::new("  ")).is_err());
    }

    /// 记录查询次数的存储
    struct CountingStore {
        inner: JsonTemplateStore,
        lookups: AtomicUsize,
    }

    impl TemplateStore for CountingStore {
        fn get(&self, id: i64) -> Result<Option<Template>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get(id)
        }
        fn by_name(&self, name: &str) -> Result<Option<Template>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.by_name(name)
        }
        fn all(&self) -> Result<Vec<Template>> {
            self.inner.all()
        }
        fn insert(&self, template: NewTemplate) -> Result<i64> {
            self.inner.insert(template)
        }
        fn update(&self, template: &Template) -> Result<()> {
            self.inner.update(template)
        }
        fn delete(&self, id: i64) -> Result<()> {
            self.inner.delete(id)
        }
    }

    #[test]
    fn test_resolver_prefers_id_with_single_lookup() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CountingStore {
            inner: store_in(&dir),
            lookups: AtomicUsize::new(0),
        });
        let id = store.insert(NewTemplate::new("by-id")).unwrap();
        store.insert(NewTemplate::new("by-name")).unwrap();

        let resolver = TemplateResolver::new(store.clone());
        let found = resolver.resolve(Some(id), Some("by-name")).unwrap();
        assert_eq!(found.name, "by-id");
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolver_none_without_reference() {
        let dir = TempDir::new().unwrap();
        let resolver = TemplateResolver::new(Arc::new(store_in(&dir)));
        assert!(resolver.resolve(None, None).is_none());
        assert!(resolver.resolve(None, Some("missing")).is_none());
    }

    struct BrokenStore;

    impl TemplateStore for BrokenStore {
        fn get(&self, _id: i64) -> Result<Option<Template>> {
            Err(anyhow!("disk on fire"))
        }
        fn by_name(&self, _name: &str) -> Result<Option<Template>> {
            Err(anyhow!("disk on fire"))
        }
        fn all(&self) -> Result<Vec<Template>> {
            Err(anyhow!("disk on fire"))
        }
        fn insert(&self, _template: NewTemplate) -> Result<i64> {
            Err(anyhow!("disk on fire"))
        }
        fn update(&self, _template: &Template) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
        fn delete(&self, _id: i64) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn test_resolver_store_error_is_not_found() {
        let resolver = TemplateResolver::new(Arc::new(BrokenStore));
        assert!(resolver.resolve(Some(1), None).is_none());
    }
}
