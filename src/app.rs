//! Application assembly and the route guard.
//!
//! `App` owns the whole client stack for one session: config, session/CSRF
//! manager, API client, domain contexts and the location gate. Lifecycle is
//! tied to the process: built on startup, contexts reset on logout.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::context::{AuthContext, CartContext, CustomerSelection};
use crate::error::Result;
use crate::http::session::{SessionManager, SessionState};
use crate::location::{GeoLocator, LocationGate};
use crate::model::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Home,
    Products,
    Cart,
    Orders,
    EditOrder,
    Dashboard,
    UserManagement,
}

impl Route {
    fn is_public(self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    /// Roles allowed past the guard; `None` means any authenticated user.
    fn allowed_roles(self) -> Option<&'static [Role]> {
        match self {
            Route::EditOrder | Route::UserManagement => Some(&[Role::Manager]),
            _ => None,
        }
    }
}

/// Where the guard (or a page) sends the user instead of rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: Route,
    pub notice: Option<String>,
}

impl Redirect {
    pub fn to(route: Route) -> Self {
        Self {
            to: route,
            notice: None,
        }
    }

    pub fn with_notice(route: Route, notice: impl Into<String>) -> Self {
        Self {
            to: route,
            notice: Some(notice.into()),
        }
    }
}

/// Outcome of loading a page: either its view model or a redirect.
#[derive(Debug)]
pub enum PageFlow<T> {
    Page(T),
    Redirect(Redirect),
}

impl<T> PageFlow<T> {
    pub fn redirect(self) -> Option<Redirect> {
        match self {
            PageFlow::Redirect(redirect) => Some(redirect),
            PageFlow::Page(_) => None,
        }
    }

    pub fn into_page(self) -> Option<T> {
        match self {
            PageFlow::Page(page) => Some(page),
            PageFlow::Redirect(_) => None,
        }
    }
}

pub struct App {
    config: Arc<ClientConfig>,
    api: Arc<ApiClient>,
    auth: Arc<AuthContext>,
    cart: Arc<CartContext>,
    customers: Arc<CustomerSelection>,
    location: Arc<LocationGate>,
}

impl App {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let session = Arc::new(SessionManager::from_config(&config)?);
        Self::with_session(config, session)
    }

    /// Assembly with an injected session manager, for tests that need to
    /// observe or stub the transport.
    pub fn with_session(config: ClientConfig, session: Arc<SessionManager>) -> Result<Self> {
        let api = Arc::new(ApiClient::new(session));
        let location = Arc::new(LocationGate::new(GeoLocator::from_config(&config)?));
        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(AuthContext::new(api.clone())),
            cart: Arc::new(CartContext::new(api.clone())),
            customers: Arc::new(CustomerSelection::new()),
            api,
            location,
        })
    }

    /// Startup: restore the session if a cookie survives, then prime the
    /// cart for the restored user.
    pub async fn init(&self) {
        self.auth.init().await;
        if self.auth.is_authenticated() {
            let _ = self.cart.refetch().await;
        }
    }

    /// Logout tears down every session-scoped context, network or not.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.cart.reset();
        self.customers.clear();
        self.location.reset();
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    pub fn cart(&self) -> &Arc<CartContext> {
        &self.cart
    }

    pub fn customers(&self) -> &Arc<CustomerSelection> {
        &self.customers
    }

    pub fn location(&self) -> &Arc<LocationGate> {
        &self.location
    }

    pub fn session_state(&self) -> SessionState {
        self.api.session().session_state()
    }

    /// Route guard for protected routes. Unauthenticated access redirects to
    /// login; a role the route does not allow redirects home.
    pub fn guard(&self, route: Route) -> std::result::Result<User, Redirect> {
        debug_assert!(!route.is_public());
        let Some(user) = self.auth.current_user() else {
            return Err(Redirect::to(Route::Login));
        };
        if let Some(allowed) = route.allowed_roles() {
            if !allowed.contains(&user.role) {
                return Err(Redirect::with_notice(
                    Route::Home,
                    "You do not have access to that page",
                ));
            }
        }
        Ok(user)
    }

    /// Login and register bounce already-authenticated users home.
    pub fn guard_public(&self) -> Option<Redirect> {
        self.auth
            .is_authenticated()
            .then(|| Redirect::to(Route::Home))
    }
}
