/// Model loading: per-format loaders and the coalescing template cache
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use tracing::{debug, error, warn};

use crate::error::{LoadError, LoadResult};
use crate::scene::{self, SceneNode};
use crate::{obj, stl};

/// Something that turns a source locator into a freshly decoded scene node.
pub trait ModelLoader {
    fn load(&self, locator: &str) -> LocalBoxFuture<'static, LoadResult<SceneNode>>;
}

impl<F, Fut> ModelLoader for F
where
    F: Fn(&str) -> Fut,
    Fut: Future<Output = LoadResult<SceneNode>> + 'static,
{
    fn load(&self, locator: &str) -> LocalBoxFuture<'static, LoadResult<SceneNode>> {
        self(locator).boxed_local()
    }
}

/// Pending or resolved normalized template, shared by every requester.
type Template = Shared<LocalBoxFuture<'static, LoadResult<Rc<SceneNode>>>>;

struct Format {
    loader: Rc<dyn ModelLoader>,
    templates: HashMap<String, Template>,
}

/// Loaders keyed by file extension, each with its own template cache.
#[derive(Default)]
pub struct ModelRegistry {
    formats: HashMap<String, Format>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `loader` for an extension including the dot (`".obj"`).
    /// Replacing a loader drops its cached templates.
    pub fn register<L>(&mut self, extension: &str, loader: L)
    where
        L: ModelLoader + 'static,
    {
        self.formats.insert(
            extension.to_string(),
            Format {
                loader: Rc::new(loader),
                templates: HashMap::new(),
            },
        );
    }

    pub fn is_registered(&self, extension: &str) -> bool {
        self.formats.contains_key(extension)
    }

    /// Request a normalized, independently clonable copy of the model at
    /// `locator`.
    ///
    /// Unknown formats fail immediately. Otherwise requests for the same
    /// locator share one underlying load and each resolves to its own clone.
    /// A failed load is evicted the next time the locator is requested.
    pub fn load(
        &mut self,
        locator: &str,
    ) -> LoadResult<LocalBoxFuture<'static, LoadResult<SceneNode>>> {
        let extension = file_extension(locator);
        let Some(format) = extension.as_ref().and_then(|ext| self.formats.get_mut(ext)) else {
            error!(locator, ?extension, "unknown object format");
            return Err(LoadError::UnknownFormat {
                locator: locator.to_string(),
                extension,
            });
        };

        let failed = format
            .templates
            .get(locator)
            .is_some_and(|template| matches!(template.peek(), Some(Err(_))));
        if failed {
            warn!(locator, "retrying previously failed model");
            format.templates.remove(locator);
        }

        let template = match format.templates.get(locator) {
            Some(template) => {
                debug!(locator, "model template cache hit");
                template.clone()
            }
            None => {
                debug!(locator, "loading model template");
                let pending = format.loader.load(locator);
                let owned = locator.to_string();
                let template: Template = async move {
                    // Normalize so the largest X/Y extent is 1; the layer
                    // scales it back up by the element's size.
                    let node = scene::normalize(pending.await?, &owned)?;
                    Ok::<_, LoadError>(Rc::new(scene::create_container(node)))
                }
                .boxed_local()
                .shared();
                format.templates.insert(locator.to_string(), template.clone());
                template
            }
        };

        Ok(async move { template.await.map(|node| (*node).clone()) }.boxed_local())
    }
}

/// The extension of the final path segment, with its dot (`".glb"`).
///
/// Query strings and fragments are ignored. Case is preserved.
pub fn file_extension(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next().unwrap_or("");
    let filename = path.rsplit('/').next().unwrap_or("");
    filename
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{ext}"))
}

/// Decode raw model bytes by the locator's extension.
pub fn decode_model(locator: &str, bytes: &[u8]) -> LoadResult<SceneNode> {
    let mesh = match file_extension(locator).as_deref() {
        Some(".obj") => obj::parse_obj(&String::from_utf8_lossy(bytes)),
        Some(".stl") => stl::parse_stl(bytes),
        extension => {
            return Err(LoadError::UnknownFormat {
                locator: locator.to_string(),
                extension: extension.map(str::to_string),
            })
        }
    }
    .map_err(|e| LoadError::parse(locator, e))?;

    if mesh.is_empty() {
        return Err(LoadError::EmptyModel(locator.to_string()));
    }
    Ok(SceneNode::with_mesh(mesh))
}

/// Loads OBJ and STL files from disk, relative to an optional base directory.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    base: Option<PathBuf>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        let path = locator.split(['?', '#']).next().unwrap_or(locator);
        match &self.base {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        }
    }

    /// Register this loader for every format it can decode.
    pub fn register_all(self, registry: &mut ModelRegistry) {
        registry.register(".obj", self.clone());
        registry.register(".stl", self);
    }
}

impl ModelLoader for FileLoader {
    fn load(&self, locator: &str) -> LocalBoxFuture<'static, LoadResult<SceneNode>> {
        let path = self.resolve(locator);
        let result = std::fs::read(&path)
            .map_err(|e| LoadError::fetch(locator, format!("{}: {e}", path.display())))
            .and_then(|bytes| decode_model(locator, &bytes));
        future::ready(result).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use nalgebra::Vector3;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("models/teapot.obj"), Some(".obj".into()));
        assert_eq!(file_extension("https://x.io/a.b/scene.glb?v=2#top"), Some(".glb".into()));
        assert_eq!(file_extension("archive.tar.GZ"), Some(".GZ".into()));
        assert_eq!(file_extension("models/teapot"), None);
        assert_eq!(file_extension("a.dir/teapot"), None);
    }

    #[test]
    fn test_unknown_format_fails_without_loading() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut registry = ModelRegistry::new();
        registry.register(".obj", move |_: &str| {
            counter.set(counter.get() + 1);
            future::ready(Ok::<_, LoadError>(SceneNode::with_mesh(Mesh::cube(1.0))))
        });

        let err = registry.load("model.OBJ").err().expect("unknown format");
        assert!(matches!(err, LoadError::UnknownFormat { .. }));
        assert!(registry.load("model").is_err());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_concurrent_requests_share_one_load() {
        let calls = Rc::new(Cell::new(0));
        let senders = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ModelRegistry::new();
        {
            let calls = calls.clone();
            let senders = senders.clone();
            registry.register(".obj", move |locator: &str| {
                calls.set(calls.get() + 1);
                let (tx, rx) = oneshot::channel::<SceneNode>();
                senders.borrow_mut().push(tx);
                let locator = locator.to_string();
                async move { rx.await.map_err(|e| LoadError::fetch(&locator, e)) }
            });
        }

        let first = registry.load("cube.obj").expect("known format");
        let second = registry.load("cube.obj").expect("known format");
        assert_eq!(calls.get(), 1);

        let tx = senders.borrow_mut().pop().expect("loader was called");
        tx.send(SceneNode::with_mesh(Mesh::cube(4.0))).expect("receiver alive");

        let (a, b) = block_on(future::join(first, second));
        let mut a = a.expect("first resolves");
        let b = b.expect("second resolves");

        // Both are normalized containers.
        assert_eq!(a.size, Some(Vector3::new(1.0, 1.0, 1.0)));
        assert_eq!(a.children.len(), 1);

        a.transform.position = Vector3::new(5.0, 5.0, 5.0);
        assert_eq!(b.transform.position, Vector3::zeros());

        // Later requests are served from the cache.
        let third = block_on(registry.load("cube.obj").expect("known format")).expect("cached");
        assert_eq!(third.size, b.size);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_load_is_evicted() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut registry = ModelRegistry::new();
        registry.register(".obj", move |locator: &str| {
            counter.set(counter.get() + 1);
            future::ready(Err::<SceneNode, _>(LoadError::fetch(locator, "404")))
        });

        let first = registry.load("missing.obj").expect("known format");
        let second = registry.load("missing.obj").expect("known format");
        let (a, b) = block_on(future::join(first, second));
        assert_eq!(a.unwrap_err(), LoadError::fetch("missing.obj", "404"));
        assert!(b.is_err());
        assert_eq!(calls.get(), 1);

        let retry = block_on(registry.load("missing.obj").expect("known format"));
        assert!(retry.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_file_loader_reads_obj() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("tri.obj"),
            "v 0 0 0\nv 2 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .expect("write obj");

        let mut registry = ModelRegistry::new();
        FileLoader::with_base(dir.path()).register_all(&mut registry);
        assert!(registry.is_registered(".stl"));

        let node = block_on(registry.load("tri.obj?cache=1").expect("known format"))
            .expect("loads from disk");
        assert_eq!(node.size, Some(Vector3::new(1.0, 0.5, 0.0)));
        assert_eq!(node.triangle_count(), 1);

        let missing = block_on(registry.load("nope.obj").expect("known format"));
        assert!(matches!(missing, Err(LoadError::Fetch { .. })));
    }
}
