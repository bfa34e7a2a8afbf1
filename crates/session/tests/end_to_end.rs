//! Catalog, grants, session and resource server working together.
//!
//! The fake service reads every resource it is handed back through the
//! resource server while the publish call is in flight, the way the real
//! service loads thumbnails and theme files.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use themelink_catalog::Catalog;
use themelink_grants::GrantRegistry;
use themelink_protocol::PublishBatchRequest;
use themelink_resource_server::wire::{
    ReadRequest, ResponseHeader, read_response_header, write_request,
};
use themelink_resource_server::{AssetProvider, ResourceServer, ServerConfig};
use themelink_session::{
    LogIndicator, PublishSession, RemoteError, RemoteFuture, RemoteService, ServiceBinder,
    SessionConfig, SessionState,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::{Context, SubscriberExt};

const APP: &str = "org.example.themes";
const SERVICE: &str = "org.example.service";

/// Theme service that downloads everything it is told about.
struct FetchingService {
    version: u32,
    resources: SocketAddr,
    fetched: Mutex<Vec<(String, Vec<u8>)>>,
    batches: Mutex<Vec<PublishBatchRequest>>,
}

impl FetchingService {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, RemoteError> {
        let mut stream = TcpStream::connect(self.resources)
            .await
            .map_err(|e| RemoteError::UnexpectedResponse(e.to_string()))?;
        write_request(&mut stream, &ReadRequest::read(SERVICE, uri, 0, 0))
            .await
            .map_err(|e| RemoteError::UnexpectedResponse(e.to_string()))?;
        match read_response_header(&mut stream)
            .await
            .map_err(|e| RemoteError::UnexpectedResponse(e.to_string()))?
        {
            ResponseHeader::Ok { payload_len, .. } => {
                let mut data = vec![0u8; payload_len as usize];
                stream
                    .read_exact(&mut data)
                    .await
                    .map_err(|e| RemoteError::UnexpectedResponse(e.to_string()))?;
                Ok(data)
            }
            ResponseHeader::Failed { message, .. } => {
                Err(RemoteError::Rejected(format!("{uri}: {message}")))
            }
        }
    }
}

impl RemoteService for FetchingService {
    fn protocol_version(&self) -> RemoteFuture<'_, u32> {
        Box::pin(async move { Ok(self.version) })
    }

    fn publish_batch(&self, request: PublishBatchRequest) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            let uris = std::iter::once(&request.thumbnail_uri).chain(&request.member_uris);
            for uri in uris {
                let data = self.fetch(uri).await?;
                self.fetched.lock().unwrap().push((uri.clone(), data));
            }
            self.batches.lock().unwrap().push(request);
            Ok(())
        })
    }
}

struct Binder {
    service: Arc<FetchingService>,
    unbinds: AtomicUsize,
}

impl ServiceBinder for Binder {
    fn bind(&self) -> RemoteFuture<'_, Arc<dyn RemoteService>> {
        Box::pin(async move { Ok(Arc::clone(&self.service) as Arc<dyn RemoteService>) })
    }

    fn unbind(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.unbinds.fetch_add(1, Ordering::SeqCst);
        })
    }
}

fn write_sunset(root: &Path) {
    std::fs::write(
        root.join("sunset.txt"),
        "# warm palette\nname=Sunset\ndescription=Warm dusk colours\n",
    )
    .unwrap();
    std::fs::write(root.join("sunset.png"), b"THUMBNAIL").unwrap();
    std::fs::create_dir(root.join("sunset")).unwrap();
    std::fs::write(root.join("sunset/bg.png"), b"BACKGROUND").unwrap();
    std::fs::write(root.join("sunset/fg.png"), b"FOREGROUND").unwrap();
}

/// Collects `LEVEL target` for every event at INFO or above.
struct EntryRecorder(Arc<Mutex<Vec<String>>>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EntryRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() <= tracing::Level::INFO {
            self.0
                .lock()
                .unwrap()
                .push(format!("{} {}", meta.level(), meta.target()));
        }
    }
}

struct World {
    _dir: tempfile::TempDir,
    cancel: CancellationToken,
    grants: Arc<GrantRegistry>,
    service: Arc<FetchingService>,
    binder: Arc<Binder>,
    catalog: Arc<Catalog>,
}

async fn world(version: u32) -> World {
    let dir = tempfile::tempdir().unwrap();
    write_sunset(dir.path());

    let grants = Arc::new(GrantRegistry::new());
    let cancel = CancellationToken::new();
    let provider = Arc::new(AssetProvider::new(dir.path(), APP, grants.clone()));
    let server = ResourceServer::new(provider, ServerConfig::default(), cancel.clone());
    let listener = server.listen().await.unwrap();
    let resources = listener.local_addr().unwrap();
    tokio::spawn(async move { server.serve(listener).await });

    let service = Arc::new(FetchingService {
        version,
        resources,
        fetched: Mutex::new(Vec::new()),
        batches: Mutex::new(Vec::new()),
    });
    let binder = Arc::new(Binder {
        service: service.clone(),
        unbinds: AtomicUsize::new(0),
    });
    let catalog = Arc::new(Catalog::new(dir.path(), APP));

    World {
        _dir: dir,
        cancel,
        grants,
        service,
        binder,
        catalog,
    }
}

fn session(world: &World) -> PublishSession {
    let config = SessionConfig {
        app_id: APP.into(),
        remote_identity: SERVICE.into(),
        ..SessionConfig::default()
    };
    PublishSession::new(
        config,
        world.binder.clone(),
        world.catalog.clone(),
        world.grants.clone(),
        Arc::new(LogIndicator::new("e2e")),
    )
}

#[tokio::test]
async fn sunset_is_published_and_readable() {
    let world = world(35).await;
    let report = session(&world).run().await;

    assert_eq!(report.final_state, SessionState::Done);
    assert_eq!(report.published_ids(), vec!["sunset"]);

    let batches = world.service.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].name, "Sunset");
    assert_eq!(batches[0].description, "Warm dusk colours");
    assert_eq!(batches[0].author, "sunset");
    assert_eq!(
        batches[0].thumbnail_uri,
        "content://org.example.themes/assets/sunset.png"
    );

    let fetched = world.service.fetched.lock().unwrap();
    let contents: Vec<&[u8]> = fetched.iter().map(|(_, data)| data.as_slice()).collect();
    assert_eq!(
        contents,
        vec![&b"THUMBNAIL"[..], &b"BACKGROUND"[..], &b"FOREGROUND"[..]]
    );

    assert_eq!(world.grants.len(), 3);
    assert_eq!(world.binder.unbinds.load(Ordering::SeqCst), 1);
    world.cancel.cancel();
}

#[tokio::test]
async fn version_one_below_floor_publishes_and_grants_nothing() {
    let world = world(34).await;

    let entries = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EntryRecorder(entries.clone()));
    let guard = tracing::subscriber::set_default(subscriber);
    let report = session(&world).run().await;
    drop(guard);

    // only the version warning reaches the default log level
    assert_eq!(
        *entries.lock().unwrap(),
        vec!["WARN themelink_session::session".to_string()]
    );

    assert_eq!(report.final_state, SessionState::Aborted);
    assert_eq!(report.remote_version, Some(34));
    assert!(world.grants.is_empty());
    assert!(world.service.batches.lock().unwrap().is_empty());
    assert!(world.service.fetched.lock().unwrap().is_empty());
    assert_eq!(world.binder.unbinds.load(Ordering::SeqCst), 1);
    world.cancel.cancel();
}

#[tokio::test]
async fn repeated_sessions_keep_grants_stable() {
    let world = world(40).await;

    let first = session(&world).run().await;
    let second = session(&world).run().await;

    assert_eq!(first.final_state, SessionState::Done);
    assert_eq!(second.final_state, SessionState::Done);
    assert_eq!(first.published, second.published);
    assert_eq!(world.grants.len(), 3);
    assert_eq!(world.service.batches.lock().unwrap().len(), 2);
    assert_eq!(world.binder.unbinds.load(Ordering::SeqCst), 2);
    world.cancel.cancel();
}
