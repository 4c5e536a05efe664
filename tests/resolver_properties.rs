//! Property tests for the dependency resolver.

use proptest::prelude::*;

use manifold::builder::{Application, GraphBuilder};
use manifold::{compile, deploy_order, CompileContext, Target};

/// Build a graph of `n` applications where `edges[k]` decides whether the
/// pair `(i, j)` with `i < j` carries a `j depends_on i` edge. Only
/// forward edges, so the graph is a DAG by construction.
fn dag_graph(n: usize, edges: &[bool]) -> (manifold::Graph, Vec<(String, String)>) {
    let context = CompileContext::default();
    let mut chosen = Vec::new();
    let mut builder = GraphBuilder::new();

    let mut k = 0;
    for j in 0..n {
        let mut app = Application::named(format!("r{j}")).image(format!("img:{j}"));
        for i in 0..j {
            if edges.get(k).copied().unwrap_or(false) {
                app = app.depends_on(format!("r{i}"));
                chosen.push((format!("r{i}"), format!("r{j}")));
            }
            k += 1;
        }
        builder = builder.with(app);
    }

    (builder.snapshot(&context).unwrap(), chosen)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: for every acyclic graph, the resolver returns an order in
    /// which each edge's prerequisite precedes its dependent.
    #[test]
    fn property_order_respects_every_edge(
        n in 2usize..10,
        edges in proptest::collection::vec(any::<bool>(), 0..45),
    ) {
        let (graph, chosen) = dag_graph(n, &edges);
        let order = deploy_order(&graph).expect("forward-only edges cannot cycle");

        prop_assert_eq!(order.len(), n);
        let position = |name: &str| order.iter().position(|id| id.name == name).unwrap();
        for (prerequisite, dependent) in chosen {
            prop_assert!(
                position(&prerequisite) < position(&dependent),
                "{} must precede {}",
                prerequisite,
                dependent
            );
        }
    }

    /// PROPERTY: the resolved order never depends on declaration order.
    #[test]
    fn property_order_ignores_declaration_order(
        n in 2usize..8,
        edges in proptest::collection::vec(any::<bool>(), 0..28),
        seed in 0usize..1000,
    ) {
        let context = CompileContext::default();
        let (graph, _) = dag_graph(n, &edges);
        let forward = deploy_order(&graph).unwrap();

        // Re-declare the same resources rotated by an arbitrary offset.
        let mut builder = GraphBuilder::new();
        let mut k_table = vec![Vec::new(); n];
        let mut k = 0;
        for j in 0..n {
            for i in 0..j {
                if edges.get(k).copied().unwrap_or(false) {
                    k_table[j].push(i);
                }
                k += 1;
            }
        }
        for offset in 0..n {
            let j = (offset + seed) % n;
            let mut app = Application::named(format!("r{j}")).image(format!("img:{j}"));
            for i in &k_table[j] {
                app = app.depends_on(format!("r{i}"));
            }
            builder = builder.with(app);
        }
        let rotated = deploy_order(&builder.snapshot(&context).unwrap()).unwrap();

        prop_assert_eq!(forward, rotated);
    }

    /// PROPERTY: a ring of any size is reported as a cycle naming every
    /// participant, and compilation produces no artifacts.
    #[test]
    fn property_rings_are_cycles(n in 2usize..8) {
        let context = CompileContext::default();
        let mut builder = GraphBuilder::new();
        for j in 0..n {
            let previous = (j + n - 1) % n;
            builder = builder.with(
                Application::named(format!("r{j}"))
                    .image(format!("img:{j}"))
                    .depends_on(format!("r{previous}")),
            );
        }
        let graph = builder.snapshot(&context).unwrap();

        let err = deploy_order(&graph).expect_err("a ring has no order");
        // Closed walk over the whole ring: n distinct nodes plus the repeat.
        prop_assert_eq!(err.path.len(), n + 1);
        for j in 0..n {
            let name = format!("r{j}");
            prop_assert!(err.path.iter().any(|id| id.name == name));
        }

        let result = compile(&graph, &context, &[Target::Manifest]);
        prop_assert!(!result.succeeded());
        prop_assert!(result.artifacts.is_empty());
    }
}
