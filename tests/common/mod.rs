//! Shared fixtures for integration tests.
#![allow(dead_code)] // each test binary uses a subset of the fixtures

use manifold::builder::{
    Application, ConfigData, ExternalRoute, GraphBuilder, NetworkService, Secret,
    StatefulApplication,
};
use manifold::{CompileContext, Graph};

/// The two-tier scenario from the product brief: a stateful database and an
/// application depending on it.
pub fn db_api_builder() -> GraphBuilder {
    GraphBuilder::new()
        .with(
            StatefulApplication::named("db")
                .image("registry.example.com/postgres:16")
                .storage(10),
        )
        .with(
            Application::named("api")
                .image("registry.example.com/api:1.4.2")
                .depends_on("db"),
        )
}

pub fn db_api_graph(context: &CompileContext) -> Graph {
    db_api_builder().snapshot(context).unwrap()
}

/// A fuller stack touching most reference roles: secret and config
/// injection, a service, and a public TLS route.
pub fn web_stack_builder() -> GraphBuilder {
    GraphBuilder::new()
        .with(Secret::named("db-credentials").key("username").key("password"))
        .with(Secret::named("edge-cert").key("tls-crt").key("tls-key"))
        .with(ConfigData::named("app-settings").entry("LOG_LEVEL", "info"))
        .with(
            StatefulApplication::named("db")
                .image("registry.example.com/postgres:16")
                .storage(20)
                .env_from_secret("db-credentials"),
        )
        .with(
            Application::named("api")
                .image("registry.example.com/api:2.0.0")
                .replicas(2)
                .port("http", 8080)
                .label("app", "api")
                .env_from_secret("db-credentials")
                .env_from_config("app-settings")
                .connect_to("db"),
        )
        .with(NetworkService::named("api-svc").selector("app", "api").port("http", 80))
        .with(
            ExternalRoute::named("edge")
                .host("api.example.com")
                .backend("api-svc")
                .tls("edge-cert")
                .public(),
        )
}

pub fn web_stack_graph(context: &CompileContext) -> Graph {
    web_stack_builder().snapshot(context).unwrap()
}
