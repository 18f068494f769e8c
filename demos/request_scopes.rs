use lifescope::{
    Component, Container, ContainerBuilder, DiResult, Dispose, Initialize, Lazy, Logger, Owned,
    Resolver, Scope, TypeDescriptor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

// ===== Domain Types =====

#[derive(Debug, Clone)]
struct User {
    id: String,
    name: String,
}

// ===== Services =====

trait UserRepository: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<User>;
    fn find_all(&self) -> Vec<User>;
}

struct InMemoryUserRepository {
    users: HashMap<String, User>,
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_id(&self, id: &str) -> Option<User> {
        self.users.get(id).cloned()
    }

    fn find_all(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }
}

impl Component for InMemoryUserRepository {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .default_with(|| {
                let users = [("1", "Alice"), ("2", "Bob"), ("3", "Charlie")]
                    .into_iter()
                    .map(|(id, name)| {
                        let user = User {
                            id: id.to_string(),
                            name: name.to_string(),
                        };
                        (user.id.clone(), user)
                    })
                    .collect();
                InMemoryUserRepository { users }
            })
            .implements::<dyn UserRepository>(|it| it)
    }
}

/// Per-request state; one instance per request scope.
struct RequestContext {
    request_id: u64,
}

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

impl Dispose for RequestContext {
    fn dispose(&self) {
        tracing::info!(request = self.request_id, "request context released");
    }
}

impl Component for RequestContext {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .default_with(|| RequestContext {
                request_id: NEXT_REQUEST.fetch_add(1, Ordering::SeqCst),
            })
            .disposable()
    }
}

/// Expensive to build; only some requests need it.
struct ReportRenderer;

impl Initialize for ReportRenderer {
    fn initialize(&self, scope: &Scope) -> DiResult<()> {
        let logger = scope.resolve::<Arc<dyn Logger>>()?;
        logger.log("report renderer warmed up");
        Ok(())
    }
}

impl Component for ReportRenderer {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .default_with(|| ReportRenderer)
            .initializable()
    }
}

impl ReportRenderer {
    fn render(&self, users: &[User]) -> String {
        users
            .iter()
            .map(|u| format!("{} ({})", u.name, u.id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A connection a handler checks out and hands back itself.
struct Connection {
    id: u64,
}

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

impl Dispose for Connection {
    fn dispose(&self) {
        tracing::info!(connection = self.id, "connection returned");
    }
}

impl Component for Connection {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .default_with(|| Connection {
                id: NEXT_CONNECTION.fetch_add(1, Ordering::SeqCst),
            })
            .disposable()
    }
}

trait RequestHandler: Send + Sync {
    fn handle(&self, path: &str, query: &str) -> DiResult<String>;
}

struct UserHandler {
    context: Arc<RequestContext>,
    repository: Arc<dyn UserRepository>,
    renderer: Lazy<Arc<ReportRenderer>>,
    scope: Scope,
}

impl RequestHandler for UserHandler {
    fn handle(&self, path: &str, query: &str) -> DiResult<String> {
        let connection = self.scope.resolve::<Owned<Connection>>()?;
        let response = match query.strip_prefix("id=") {
            Some(id) => match self.repository.find_by_id(id) {
                Some(user) => format!("User: {} ({})", user.name, user.id),
                None => "User not found".to_string(),
            },
            None => {
                let users = self.repository.find_all();
                format!("All users: [{}]", self.renderer.get()?.render(&users))
            }
        };
        connection.dispose();

        Ok(format!(
            "Request ID: {}\nPath: {}\nConnection: {}\nResponse: {}",
            self.context.request_id, path, connection.id, response
        ))
    }
}

impl Component for UserHandler {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .initializer(
                |context: Arc<RequestContext>,
                 repository: Arc<dyn UserRepository>,
                 renderer: Lazy<Arc<ReportRenderer>>,
                 scope: Scope| UserHandler {
                    context,
                    repository,
                    renderer,
                    scope,
                },
            )
            .implements::<dyn RequestHandler>(|it| it)
    }
}

// ===== Configuration =====

fn configure_services() -> DiResult<Container> {
    let mut builder = ContainerBuilder::new();

    // Shared across all requests
    builder
        .register_singleton::<InMemoryUserRepository>()?
        .as_service::<dyn UserRepository>()?;
    builder.register_singleton::<ReportRenderer>()?.as_self();

    // One per request
    builder.register_scoped::<RequestContext>()?.as_self();
    builder
        .register_scoped::<UserHandler>()?
        .as_service::<dyn RequestHandler>()?;

    // Checked out per use
    builder.register::<Connection>()?.as_self();

    Ok(builder.build())
}

fn handle_request(container: &Container, path: &str, query: &str) -> DiResult<String> {
    let scope = container.begin_scope()?;
    let handler = scope.resolve::<Arc<dyn RequestHandler>>()?;
    let same = scope.resolve::<Arc<dyn RequestHandler>>()?;
    debug_assert!(Arc::ptr_eq(&handler, &same));

    let response = handler.handle(path, query);
    scope.dispose();
    response
}

// ===== Main =====

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lifescope=debug")),
        )
        .init();

    let container = configure_services()?;

    let requests = [("/users", ""), ("/users", "id=1"), ("/users", "id=2"), ("/users", "id=9")];
    let workers: Vec<_> = requests
        .into_iter()
        .map(|(path, query)| {
            let container = container.clone();
            thread::spawn(move || handle_request(&container, path, query))
        })
        .collect();

    for worker in workers {
        match worker.join() {
            Ok(Ok(response)) => println!("{response}\n"),
            Ok(Err(err)) => eprintln!("request failed: {err}"),
            Err(_) => eprintln!("request thread panicked"),
        }
    }

    container.dispose();
    Ok(())
}
