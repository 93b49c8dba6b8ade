use chrono::{DateTime, Duration, TimeZone, Utc};
use graphweave::config::{ClusteringMethod, LayoutMethod};
use graphweave::graph::{EdgeType, NodeId, NodeType};
use graphweave::similarity::SimilarityEngine;
use graphweave::{
    EdgeFilteringOptions, GraphBuilder, GraphPipeline, PipelineConfig, SourceRecord, TransformationOptions,
};
use rustc_hash::FxHashMap;
use serde_json::json;

const SHARED_BODY: &str = "Retrieval augmented generation combines a vector index with a language model. \
    Documents are chunked, embedded and stored; at query time the most relevant chunks are retrieved \
    and placed into the prompt so the model can ground its answer in source material.";

const TOPICS: [&str; 10] = [
    "Sourdough fermentation depends on wild yeast cultures and patient proofing schedules",
    "Marathon training blocks alternate tempo intervals with long aerobic base mileage",
    "Watercolor glazing layers transparent pigment washes over dried paper surfaces",
    "Beekeeping inspections check brood frames, queen health and honey stores carefully",
    "Bouldering technique favors precise footwork, hip rotation and controlled dynamic moves",
    "Container gardening needs drainage holes, potting mix and consistent watering routines",
    "Chess endgames reward king activity, passed pawns and accurate opposition counting",
    "Espresso extraction balances grind size, dose weight, water temperature and timing",
    "Birdwatching field guides describe plumage, song patterns and seasonal migration routes",
    "Woodworking joinery relies on sharp chisels, careful marking and dovetail layout",
];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn pipeline(config: PipelineConfig) -> GraphPipeline {
    GraphPipeline::new(config).with_reference_time(now())
}

fn topic_records() -> Vec<SourceRecord> {
    TOPICS
        .iter()
        .enumerate()
        .map(|(i, body)| {
            let mut record = SourceRecord::new(format!("doc-{}", i), format!("Topic {}", i), *body)
                .with_created(now() - Duration::days(3 * i as i64));
            if i < 3 {
                record = record.with_property("Tags", json!(["AI"]));
            }
            record
        })
        .collect()
}

#[test]
fn test_near_identical_documents_get_a_similarity_edge() {
    let records = vec![
        SourceRecord::new("a", "RAG overview", SHARED_BODY).with_created(now() - Duration::hours(1)),
        SourceRecord::new("b", "RAG notes", format!("{} See also reranking.", SHARED_BODY))
            .with_created(now() - Duration::hours(1)),
    ];
    let options = TransformationOptions {
        include_tags: false,
        include_insights: false,
        ..Default::default()
    };
    let (graph, _) = pipeline(PipelineConfig::default()).run_with_options(&records, &options, 1);

    let similarity: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Similarity)
        .collect();
    assert_eq!(similarity.len(), 1);
    assert!(similarity[0].weight >= 0.1);
    assert_eq!(similarity[0].key(), (&NodeId::new("a"), &NodeId::new("b")));
}

#[test]
fn test_single_tag_node_links_tagged_documents() {
    let options = TransformationOptions {
        min_strength: 0.1,
        include_insights: false,
        ..Default::default()
    };
    let engine = SimilarityEngine::new(Default::default()).with_reference_time(now());
    let output = GraphBuilder::new(options, engine)
        .with_reference_time(now())
        .build(&topic_records());

    let tags: Vec<_> = output.nodes.iter().filter(|n| n.node_type == NodeType::Tag).collect();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].id.as_str(), "ai");

    let tag_edges: Vec<_> = output.edges.iter().filter(|e| e.edge_type == EdgeType::Tag).collect();
    assert_eq!(tag_edges.len(), 3);
    for edge in tag_edges {
        assert_eq!(edge.source.as_str(), "ai");
        assert!(["doc-0", "doc-1", "doc-2"].contains(&edge.target.as_str()));
        assert!((edge.weight - 0.4).abs() < 1e-9);
    }
}

#[test]
fn test_edge_bound_holds_after_filtering() {
    let config = PipelineConfig {
        edge_filtering: EdgeFilteringOptions {
            max_edges_per_node: 2,
            min_edge_weight: 0.0,
            ..Default::default()
        },
        ..Default::default()
    };
    for method in [
        ClusteringMethod::Semantic,
        ClusteringMethod::Kmeans,
        ClusteringMethod::Hierarchical,
        ClusteringMethod::None,
    ] {
        let options = TransformationOptions {
            clustering_method: method,
            ..Default::default()
        };
        let (graph, report) = pipeline(config.clone()).run_with_options(&topic_records(), &options, 1);
        assert!(graph.validate().is_ok(), "{:?}", method);
        assert_eq!(report.filter.orphans, 0);

        let mut organic: FxHashMap<&NodeId, usize> = FxHashMap::default();
        let mut synthetic: FxHashMap<&NodeId, usize> = FxHashMap::default();
        for edge in &graph.edges {
            let counts = if edge.edge_type == EdgeType::Connection {
                &mut synthetic
            } else {
                &mut organic
            };
            *counts.entry(&edge.source).or_insert(0) += 1;
            *counts.entry(&edge.target).or_insert(0) += 1;
        }
        for node in &graph.nodes {
            assert!(organic.get(&node.id).copied().unwrap_or(0) <= 2, "{:?} {}", method, node.id);
            assert!(graph.edges_of(&node.id).count() >= 1, "{:?} {} is isolated", method, node.id);
        }
    }
}

#[test]
fn test_cluster_reduction_uses_assigned_clusters() {
    let config = PipelineConfig {
        edge_filtering: EdgeFilteringOptions {
            clustering_enabled: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let options = TransformationOptions {
        clustering_method: ClusteringMethod::Kmeans,
        layout_method: LayoutMethod::Circular,
        ..Default::default()
    };
    let (graph, _) = pipeline(config).run_with_options(&topic_records(), &options, 1);
    assert!(graph.validate().is_ok());

    for cluster in &graph.clusters {
        for member in &cluster.members {
            let node = graph.get_node(member).unwrap();
            assert_eq!(node.cluster(), Some(cluster.id.as_str()));
        }
    }
    for edge in graph.edges.iter().filter(|e| e.edge_type == EdgeType::Cluster) {
        assert!(edge.properties.contains_key("sourceCluster"));
        assert!(edge.properties.contains_key("edgeCount"));
    }
}

#[test]
fn test_malformed_records_are_defaulted() {
    let records: Vec<SourceRecord> = serde_json::from_value(json!([
        {"id": "x", "title": "", "createdTime": "yesterday-ish", "properties": {"Quality Score": "n/a"}},
        {"id": "y", "title": "Fine", "content": "Short note"},
        {"id": "x", "title": "Duplicate id"}
    ]))
    .unwrap();
    let graph = pipeline(PipelineConfig::default()).run(&records, 7);

    assert!(graph.validate().is_ok());
    assert_eq!(graph.metadata.version, 7);
    let docs: Vec<_> = graph.nodes.iter().filter(|n| n.node_type == NodeType::Document).collect();
    assert_eq!(docs.len(), 2);
    assert_eq!(graph.get_node(&NodeId::new("x")).unwrap().label, "Untitled Document");
    for node in &graph.nodes {
        assert!((0.0..=1.0).contains(&node.metadata.strength));
    }
}

#[test]
fn test_layout_methods_produce_finite_positions() {
    for layout in [
        LayoutMethod::ForceDirected,
        LayoutMethod::Hierarchical,
        LayoutMethod::Circular,
        LayoutMethod::Tree,
    ] {
        let options = TransformationOptions {
            layout_method: layout,
            ..Default::default()
        };
        let (graph, report) = pipeline(PipelineConfig::default()).run_with_options(&topic_records(), &options, 1);
        assert_eq!(report.layout_resets, 0);
        assert!(graph.nodes.iter().all(|n| n.position.is_finite()), "{:?}", layout);
    }
}

#[test]
fn test_graph_json_shape() {
    let graph = pipeline(PipelineConfig::default()).run(&topic_records(), 3);
    let value = serde_json::to_value(&graph).unwrap();
    assert_eq!(value["metadata"]["version"], 3);
    assert_eq!(value["metadata"]["totalNodes"], graph.nodes.len());
    assert!(value["metadata"]["lastUpdate"].is_string());
    assert!(value["nodes"][0]["metadata"]["strength"].is_number());

    let parsed: graphweave::Graph = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.nodes.len(), graph.nodes.len());
}
