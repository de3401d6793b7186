//! Fetching, compiling and instantiating the module that owns the frame buffer.
use log::{debug, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use thiserror::Error;
use url::Url;
use wasmi::{Engine, Linker, Memory, Module, Store, TypedFunc};

/// the function that says where the current frame starts
pub const NEXT_FRAME_EXPORT: &str = "next_frame";
/// the module's linear memory, as `wasm-bindgen` names it
pub const MEMORY_EXPORT: &str = "memory";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unable to fetch Web Assembly file {url} (status {status})")]
    Status { url: String, status: u16 },
    #[error("Unable to fetch Web Assembly file {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("can't fetch {url}: unsupported scheme `{scheme}`")]
    UnsupportedScheme { url: String, scheme: String },
}

impl FetchError {
    fn transport(url: &str, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        FetchError::Transport {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to compile {url}: {source}")]
    Compile {
        url: String,
        #[source]
        source: wasmi::Error,
    },
    #[error("failed to instantiate {url}: {source}")]
    Instantiate {
        url: String,
        #[source]
        source: wasmi::Error,
    },
    #[error("{url} does not export `{name}`")]
    MissingExport { url: String, name: &'static str },
    #[error("`{name}` exported by {url} has the wrong type: {source}")]
    ExportType {
        url: String,
        name: &'static str,
        #[source]
        source: wasmi::Error,
    },
    #[error("load of {url} was abandoned before it finished")]
    Abandoned { url: String },
}

/// what came back from a fetch: a status code in HTTP terms, and the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl Fetched {
    pub fn ok(bytes: Vec<u8>) -> Self {
        Fetched { status: 200, bytes }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Retrieves the bytes behind a URL. Implementations only transport bytes;
/// judging the status is left to the [`Loader`].
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// plain GET over http(s), no headers, no retries
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::transport(url, e))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .map_err(|e| FetchError::transport(url, e))?;
        Ok(Fetched {
            status,
            bytes: bytes.to_vec(),
        })
    }
}

/// reads `file://` URLs and bare paths from disk, reporting missing files
/// the way a web server would
pub struct FileFetcher;

impl FileFetcher {
    fn path_of(url: &str) -> PathBuf {
        match Url::parse(url) {
            Ok(u) if u.scheme() == "file" => u
                .to_file_path()
                .unwrap_or_else(|_| PathBuf::from(u.path())),
            _ => PathBuf::from(url),
        }
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let path = FileFetcher::path_of(url);
        debug!("reading {}", path.display());
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Fetched::ok(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Fetched {
                status: 404,
                bytes: Vec::new(),
            }),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(Fetched {
                status: 403,
                bytes: Vec::new(),
            }),
            Err(e) => Err(FetchError::transport(url, e)),
        }
    }
}

/// picks [`HttpFetcher`] or [`FileFetcher`] by looking at the URL
pub struct UrlFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl UrlFetcher {
    pub fn new() -> Self {
        UrlFetcher {
            http: HttpFetcher::new(),
            file: FileFetcher,
        }
    }
}

impl Default for UrlFetcher {
    fn default() -> Self {
        UrlFetcher::new()
    }
}

impl Fetcher for UrlFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        match Url::parse(url) {
            Ok(u) => match u.scheme() {
                "http" | "https" => self.http.fetch(url),
                "file" => self.file.fetch(url),
                // a windows drive letter, not a scheme
                s if s.len() == 1 => self.file.fetch(url),
                s => Err(FetchError::UnsupportedScheme {
                    url: url.to_string(),
                    scheme: s.to_string(),
                }),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => self.file.fetch(url),
            Err(e) => Err(FetchError::transport(url, e)),
        }
    }
}

/// useful for testing; serves canned responses and 404s everything else
#[derive(Default)]
pub struct DummyFetcher {
    responses: HashMap<String, Fetched>,
}

impl DummyFetcher {
    pub fn new() -> Self {
        DummyFetcher::default()
    }

    pub fn with(mut self, url: &str, response: Fetched) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }
}

impl Fetcher for DummyFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        Ok(self.responses.get(url).cloned().unwrap_or(Fetched {
            status: 404,
            bytes: Vec::new(),
        }))
    }
}

fn fetch_ok(fetcher: &dyn Fetcher, url: &str) -> Result<Vec<u8>, FetchError> {
    info!("fetching {}", url);
    let fetched = fetcher.fetch(url)?;
    if !fetched.is_ok() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: fetched.status,
        });
    }
    debug!("fetched {} bytes from {}", fetched.bytes.len(), url);
    Ok(fetched.bytes)
}

/// An instantiated module: the frame-offset function and the memory it
/// points into.
pub struct ModuleExports {
    store: Store<()>,
    next_frame: TypedFunc<(), i32>,
    memory: Memory,
    #[cfg(test)]
    instance: wasmi::Instance,
}

impl ModuleExports {
    /// ask the module where its current frame buffer starts
    pub fn next_frame(&mut self) -> Result<usize, wasmi::Error> {
        let offset = self.next_frame.call(&mut self.store, ())?;
        // wasm32 addresses are unsigned
        Ok(offset as u32 as usize)
    }

    /// the whole of the module's linear memory, as it is right now
    pub fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    /// grow linear memory behind the renderer's back, through the test
    /// module's `grow` export; returns the old size in pages, or -1
    #[cfg(test)]
    pub(crate) fn grow_memory(&mut self, pages: i32) -> Result<i32, wasmi::Error> {
        let grow = self
            .instance
            .get_typed_func::<i32, i32>(&self.store, crate::testing::GROW_EXPORT)?;
        grow.call(&mut self.store, pages)
    }
}

impl fmt::Debug for ModuleExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleExports")
            .field("memory_len", &self.memory().len())
            .finish_non_exhaustive()
    }
}

/// Turns a URL into [`ModuleExports`].
///
/// Modules are instantiated against [`Loader::imports_mut`], which is empty
/// unless the caller defines something in it.
pub struct Loader {
    engine: Engine,
    linker: Linker<()>,
    fetcher: Arc<dyn Fetcher>,
}

impl Loader {
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        let engine = Engine::default();
        let linker = Linker::new(&engine);
        Loader {
            engine,
            linker,
            fetcher: Arc::new(fetcher),
        }
    }

    /// the import object handed to every module this loader instantiates
    pub fn imports_mut(&mut self) -> &mut Linker<()> {
        &mut self.linker
    }

    /// fetch, compile and instantiate, all on the calling thread
    pub fn load(&self, url: &str) -> Result<ModuleExports, LoadError> {
        let bytes = fetch_ok(&*self.fetcher, url)?;
        self.instantiate(url, &bytes)
    }

    /// fetch on a worker thread; finish with [`PendingLoad::try_finish`]
    pub fn spawn(&self, url: &str) -> PendingLoad {
        let (tx, rx) = mpsc::channel();
        let fetcher = Arc::clone(&self.fetcher);
        let target = url.to_string();
        let spawned = thread::Builder::new()
            .name("module-fetch".to_string())
            .spawn(move || {
                // nobody listening any more is fine
                let _ = tx.send(fetch_ok(&*fetcher, &target));
            });
        if let Err(e) = spawned {
            // the sender went down with the closure, so the load reports itself abandoned
            warn!("couldn't start fetch thread for {}: {}", url, e);
        }
        PendingLoad {
            url: url.to_string(),
            rx,
        }
    }

    pub fn instantiate(&self, url: &str, bytes: &[u8]) -> Result<ModuleExports, LoadError> {
        let module = Module::new(&self.engine, bytes).map_err(|source| LoadError::Compile {
            url: url.to_string(),
            source,
        })?;
        let mut store = Store::new(&self.engine, ());
        let instance = self
            .linker
            .instantiate_and_start(&mut store, &module)
            .map_err(|source| LoadError::Instantiate {
                url: url.to_string(),
                source,
            })?;

        let missing = |name| LoadError::MissingExport {
            url: url.to_string(),
            name,
        };
        let next_frame = instance
            .get_func(&store, NEXT_FRAME_EXPORT)
            .ok_or_else(|| missing(NEXT_FRAME_EXPORT))?
            .typed::<(), i32>(&store)
            .map_err(|source| LoadError::ExportType {
                url: url.to_string(),
                name: NEXT_FRAME_EXPORT,
                source,
            })?;
        let memory = instance
            .get_memory(&store, MEMORY_EXPORT)
            .ok_or_else(|| missing(MEMORY_EXPORT))?;

        let exports = ModuleExports {
            store,
            next_frame,
            memory,
            #[cfg(test)]
            instance,
        };
        info!("loaded {} ({} bytes of linear memory)", url, exports.memory().len());
        Ok(exports)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new(UrlFetcher::new())
    }
}

/// A load whose fetch is still in flight.
pub struct PendingLoad {
    url: String,
    rx: mpsc::Receiver<Result<Vec<u8>, FetchError>>,
}

impl PendingLoad {
    #[cfg(test)]
    pub(crate) fn from_receiver(url: &str, rx: mpsc::Receiver<Result<Vec<u8>, FetchError>>) -> Self {
        PendingLoad {
            url: url.to_string(),
            rx,
        }
    }

    #[cfg(test)]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `None` while the fetch is still going; otherwise compile and
    /// instantiate what arrived, on the calling thread
    pub fn try_finish(&self, loader: &Loader) -> Option<Result<ModuleExports, LoadError>> {
        match self.rx.try_recv() {
            Ok(Ok(bytes)) => Some(loader.instantiate(&self.url, &bytes)),
            Ok(Err(e)) => Some(Err(e.into())),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(LoadError::Abandoned {
                url: self.url.clone(),
            })),
        }
    }

    /// block until the load is done one way or the other
    #[cfg(test)]
    pub fn wait(self, loader: &Loader) -> Result<ModuleExports, LoadError> {
        match self.rx.recv() {
            Ok(Ok(bytes)) => loader.instantiate(&self.url, &bytes),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(LoadError::Abandoned { url: self.url }),
        }
    }
}
