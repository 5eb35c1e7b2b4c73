use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub association: Association,
	#[serde(default)]
	pub datasources: Vec<Datasource>,
	#[serde(default)]
	pub facets: Vec<Facet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	/// Collection holding one point per entity with its precomputed one-hop closure.
	pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Association {
	pub default_page_size: u32,
	pub max_page_size: u32,
	/// Upper bound on concurrent evidence fetches across all requests.
	pub max_concurrent_fetches: u32,
	pub fetch_timeout_ms: u64,
	/// Divisor exponent applied to the 1-based rank of each contribution. `1.0` is the
	/// plain harmonic sum.
	#[serde(default = "default_rank_damping_exponent")]
	pub rank_damping_exponent: f64,
	#[serde(default = "default_closure_cache")]
	pub closure_cache: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Datasource {
	pub id: String,
	pub weight: f64,
	#[serde(default)]
	pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Facet {
	pub dimension: String,
	pub side: FacetSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetSide {
	Source,
	Destination,
}

fn default_rank_damping_exponent() -> f64 {
	1.0
}

fn default_closure_cache() -> bool {
	true
}
