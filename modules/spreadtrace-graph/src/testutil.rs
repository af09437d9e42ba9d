//! Test utilities for spinning up a real Neo4j instance via testcontainers.

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::GraphClient;

/// Spin up a Neo4j container and return the container handle + connected GraphClient.
///
/// The container is dropped (and stopped) when `ContainerAsync` goes out of scope,
/// so callers must hold it alive for the duration of the test.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let image = GenericImage::new("neo4j", "5.25.1-community")
        .with_exposed_port(ContainerPort::Tcp(7687))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", "neo4j/testpassword");

    let container: ContainerAsync<GenericImage> = image
        .start()
        .await
        .expect("Failed to start Neo4j container");

    let host_port = container
        .get_host_port_ipv4(7687)
        .await
        .expect("Failed to get Neo4j host port");

    let uri = format!("bolt://127.0.0.1:{host_port}");
    let client = GraphClient::connect(&uri, "neo4j", "testpassword", 4)
        .await
        .expect("Failed to connect to Neo4j");

    (container, client)
}

/// Build a reshare chain `p0 <- p1 <- ... <- p{depth}` where `p0` belongs to `event`.
pub async fn seed_chain(client: &GraphClient, event: &str, depth: usize) {
    let q = neo4rs::query(
        "CREATE (ev:Event {vid: 'ev-' + $event, eventstr: $event})
         CREATE (p0:Original_Tweet {vid: 'p0', content: 'origin', publishtimestamp: 1700000000000})
         CREATE (p0)-[:BELONG]->(ev)
         WITH p0
         UNWIND range(1, $depth) AS i
         CREATE (:Retweet {vid: 'p' + toString(i), forwardcount: i})",
    )
    .param("event", event)
    .param("depth", depth as i64);
    client.inner().run(q).await.expect("seed vertices");

    let q = neo4rs::query(
        "UNWIND range(1, $depth) AS i
         MATCH (a {vid: 'p' + toString(i)}), (b {vid: 'p' + toString(i - 1)})
         CREATE (a)-[:FORWARDED {rank: 0}]->(b)",
    )
    .param("depth", depth as i64);
    client.inner().run(q).await.expect("seed forwards");
}
