pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_association_evidence.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_association_evidence.sql")),
				"tables/002_entity_annotations.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_entity_annotations.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	#[test]
	fn includes_are_inlined() {
		let sql = super::render_schema();

		assert!(sql.contains("CREATE TABLE IF NOT EXISTS association_evidence"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS entity_annotations"));
		assert!(!sql.contains("\\ir "));
	}
}
