use kg_config::Postgres;
use kg_storage::{
	db::Db,
	evidence,
	models::{AnnotationRow, EvidenceRow},
};
use kg_testkit::TestDatabase;

fn evidence_row(source_id: &str, destination_id: &str, score: f64) -> EvidenceRow {
	EvidenceRow {
		source_id: source_id.to_string(),
		destination_id: destination_id.to_string(),
		score,
	}
}

fn ids(raw: &[&str]) -> Vec<String> {
	raw.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KG_PG_DSN to run."]
async fn tables_exist_after_bootstrap() {
	let Some(base_dsn) = kg_testkit::env_dsn() else {
		eprintln!("Skipping tables_exist_after_bootstrap; set KG_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");
	// Bootstrapping twice must be a no-op.
	db.ensure_schema().await.expect("Failed to re-run schema.");

	let pool = test_db.pool(1).await.expect("Failed to open test pool.");

	for table in ["association_evidence", "entity_annotations"] {
		let count: i64 = sqlx::query_scalar(
			"SELECT count(*) FROM information_schema.tables WHERE table_name = $1",
		)
		.bind(table)
		.fetch_one(&pool)
		.await
		.expect("Failed to query schema tables.");

		assert_eq!(count, 1, "missing table {table}");
	}

	pool.close().await;
	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KG_PG_DSN to run."]
async fn evidence_fetch_collapses_duplicates_and_honours_destinations() {
	let Some(base_dsn) = kg_testkit::env_dsn() else {
		eprintln!(
			"Skipping evidence_fetch_collapses_duplicates_and_honours_destinations; set KG_PG_DSN to run."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	for row in [
		evidence_row("ENSG1", "EFO1", 0.25),
		evidence_row("ENSG1", "EFO1", 0.75),
		evidence_row("ENSG1", "EFO2", 0.5),
		evidence_row("ENSG2", "EFO1", 0.5),
	] {
		evidence::insert_evidence(&db.pool, "chembl", &row).await.expect("Failed to insert row.");
	}

	evidence::insert_evidence(&db.pool, "europepmc", &evidence_row("ENSG1", "EFO1", 1.0))
		.await
		.expect("Failed to insert row.");

	let mut rows = evidence::fetch_evidence(&db.pool, "chembl", &ids(&["ENSG1"]), None)
		.await
		.expect("Failed to fetch evidence.");

	rows.sort_by(|a, b| a.destination_id.cmp(&b.destination_id));

	assert_eq!(rows, vec![evidence_row("ENSG1", "EFO1", 0.75), evidence_row("ENSG1", "EFO2", 0.5)]);

	let destinations = ids(&["EFO2"]);
	let rows = evidence::fetch_evidence(
		&db.pool,
		"chembl",
		&ids(&["ENSG1", "ENSG2"]),
		Some(destinations.as_slice()),
	)
	.await
	.expect("Failed to fetch evidence.");

	assert_eq!(rows, vec![evidence_row("ENSG1", "EFO2", 0.5)]);

	let no_destinations: Vec<String> = Vec::new();
	let rows = evidence::fetch_evidence(
		&db.pool,
		"chembl",
		&ids(&["ENSG1"]),
		Some(no_destinations.as_slice()),
	)
	.await
	.expect("Failed to fetch evidence.");

	assert!(rows.is_empty());

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KG_PG_DSN to run."]
async fn annotations_are_filtered_by_dimension() {
	let Some(base_dsn) = kg_testkit::env_dsn() else {
		eprintln!("Skipping annotations_are_filtered_by_dimension; set KG_PG_DSN to run.");

		return;
	};

	kg_testkit::with_test_db(&base_dsn, |dsn| async move {
		let cfg = Postgres { dsn, pool_max_conns: 1 };
		let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

		db.ensure_schema().await.expect("Failed to ensure schema.");

		for (entity_id, dimension, value) in [
			("EFO1", "therapeutic_area", "oncology"),
			("EFO1", "therapeutic_area", "oncology"),
			("EFO1", "tissue", "liver"),
			("EFO2", "therapeutic_area", "immunology"),
		] {
			let row = AnnotationRow {
				entity_id: entity_id.to_string(),
				dimension: dimension.to_string(),
				value: value.to_string(),
			};

			evidence::insert_annotation(&db.pool, &row)
				.await
				.expect("Failed to insert annotation.");
		}

		let rows = evidence::fetch_annotations(
			&db.pool,
			&ids(&["EFO1", "EFO2", "EFO3"]),
			&ids(&["therapeutic_area"]),
		)
		.await
		.expect("Failed to fetch annotations.");
		let values: Vec<_> =
			rows.iter().map(|row| (row.entity_id.as_str(), row.value.as_str())).collect();

		assert_eq!(values, vec![("EFO1", "oncology"), ("EFO2", "immunology")]);

		db.pool.close().await;

		Ok(())
	})
	.await
	.expect("Test database run failed.");
}
