use crate::notes::{Note, TagsCodec};
use crate::{Context, OutputMode, emit_success};
use chrono::{Duration, Utc};
use modelstore::config::{self, StoreConfig, DEFAULT_TABLE_PREFIX, DEFAULT_VERSION};
use modelstore::ui::{self, Icons, banner, columns_table, section, stats_table, success, summary_row};
use modelstore::{CodecRegistry, Database, FieldValue, Model, RecordStore, SchemaDeriver};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;

fn build_store(database: &Path, config: &StoreConfig) -> anyhow::Result<RecordStore> {
    config::ensure_db_dir(database)?;
    let db = Arc::new(Database::open_path(database, config.version()));
    Ok(RecordStore::builder(db)
        .table_prefix(config.table_prefix())
        .codec(Arc::new(TagsCodec))
        .register::<Note>()
        .build()?)
}

pub fn run_init(
    ctx: &Context,
    database: Option<&Path>,
    force: bool,
    version: Option<i32>,
    prefix: Option<String>,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let version = version.unwrap_or(DEFAULT_VERSION);
    if version < 1 {
        anyhow::bail!("schema version must be >= 1, got {}", version);
    }

    let config = StoreConfig {
        database: Some(
            database
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ".modelstore/modelstore.db".to_string()),
        ),
        version: Some(version),
        table_prefix: Some(prefix.unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string())),
    };
    config::write_config(&ctx.config_path, &config, force)?;
    config::ensure_gitignore(ctx.project_root())?;

    let db_path = config.database_path_in(ctx.project_root());
    let store = build_store(&db_path, &config)?;
    store.open()?;
    let stats = store.stats()?;
    store.close()?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", ctx.config_path.display()));
        ui::status(Icons::DATABASE, "Database", &db_path.display().to_string());
        ui::status(Icons::GEAR, "Schema version", &stats.version.to_string());
        ui::status(Icons::FILE, "Tables", &stats.tables.len().to_string());
    } else {
        let data = serde_json::json!({
            "config": ctx.config_path.display().to_string(),
            "database": db_path.display().to_string(),
            "stats": stats,
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

pub fn run_stats(ctx: &Context, output_mode: OutputMode) -> anyhow::Result<()> {
    if !ctx.database.exists() {
        anyhow::bail!(
            "no database at {} (run `modelstore init` first)",
            ctx.database.display()
        );
    }

    let db = Database::open_path(&ctx.database, ctx.config.version());
    let stats = db.table_stats(ctx.config.table_prefix())?;

    if output_mode.is_human() {
        banner(
            &format!("{} Modelstore Statistics", Icons::STATS),
            &ctx.database.display().to_string(),
        );
        let version = stats.version.to_string();
        let configured = ctx.config.version().to_string();
        let tables = stats.tables.len().to_string();
        let rows = stats.total_rows().to_string();
        println!(
            "{}",
            stats_table(&[
                ("Stored version", version.as_str()),
                ("Configured version", configured.as_str()),
                ("Tables", tables.as_str()),
                ("Rows", rows.as_str()),
            ])
        );
        if !stats.tables.is_empty() {
            section("Tables");
            for table in &stats.tables {
                summary_row(&table.name, &table.rows.to_string());
            }
        }
        ui::info("Config", &ctx.config_path.display().to_string());
        if stats.version > ctx.config.version() {
            ui::warn("stored version is newer than the configured one; opening will be refused");
        }
    } else {
        emit_success(output_mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

pub fn run_schema(ctx: &Context, output_mode: OutputMode) -> anyhow::Result<()> {
    let registry = CodecRegistry::default().with_codec(Arc::new(TagsCodec));
    let descriptor = Note::descriptor();
    let schema = SchemaDeriver::new(&registry, ctx.config.table_prefix()).derive(&descriptor)?;

    let columns: Vec<(&str, String, String)> = schema
        .columns()
        .iter()
        .map(|c| (c.name(), c.semantic_type().to_string(), c.affinity().to_string()))
        .collect();
    let skipped: Vec<&str> = descriptor
        .all_fields()
        .iter()
        .map(|f| f.name())
        .filter(|name| *name != "id" && schema.column(name).is_none())
        .collect();

    if output_mode.is_human() {
        banner(
            &format!("{} {}", Icons::MAG, descriptor.type_name()),
            &format!("lineage: {}", descriptor.lineage().join(" -> ")),
        );
        println!("{}", columns_table(&columns));
        if !skipped.is_empty() {
            summary_row("Not persisted:", &skipped.join(", "));
        }
        section("DDL");
        println!("{}", schema.create_statement().style(ui::theme().info.clone()));
    } else {
        let data = serde_json::json!({
            "type": descriptor.type_name(),
            "table": schema.table_name(),
            "columns": columns
                .iter()
                .map(|(name, semantic, affinity)| serde_json::json!({
                    "name": name,
                    "type": semantic,
                    "affinity": affinity,
                }))
                .collect::<Vec<_>>(),
            "skipped": skipped,
            "ddl": schema.create_statement(),
        });
        emit_success(output_mode, "schema", data)?;
    }
    Ok(())
}

pub fn run_demo(ctx: &Context, count: usize, reset: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let store = build_store(&ctx.database, &ctx.config)?;

    let removed = if reset { store.delete_all::<Note>()? } else { 0 };

    let mut saved = Vec::with_capacity(count);
    for i in 1..=count {
        let mut note = Note::new(&format!("Demo note number {}", i), (i % 3) as i32 + 1);
        note.pinned = i % 2 == 0;
        note.score = i as f32 * 0.5;
        note.weight = i as f64 * 1.25;
        note.due = Some(Utc::now() + Duration::days(i as i64));
        note.tags = vec!["demo".to_string()];
        if note.pinned {
            note.tags.push("pinned".to_string());
        }
        note.draft = "scratch text".to_string();
        store.save(&mut note)?;
        saved.push(note);
    }

    if let Some(first) = saved.first_mut() {
        first.title.push_str(" (edited)");
        store.save(first)?;
    }

    let total = store.find_count::<Note>()?;
    let pinned: Vec<Note> = store.find(
        Some("pinned = ?1"),
        &[FieldValue::Bool(true)],
        Some("priority DESC, id ASC"),
        0,
        0,
    )?;
    let first_page: Vec<Note> = store.get_all(Some("id ASC"), 1, 3)?;
    let reloaded: Option<Note> = match saved.first() {
        Some(note) => store.get(note.id())?,
        None => None,
    };
    let stats = store.stats()?;
    store.close()?;

    if output_mode.is_human() {
        banner(
            &format!("{} Modelstore Demo", Icons::ROCKET),
            &ctx.database.display().to_string(),
        );
        if reset {
            summary_row("Removed:", &removed.to_string());
        }
        summary_row("Saved:", &saved.len().to_string());
        summary_row("Total notes:", &total.to_string());

        if let Some(note) = &reloaded {
            section("Reloaded");
            summary_row(&format!("#{}", note.id()), &note.title);
            summary_row("tags:", &note.tags.join(", "));
            summary_row("draft:", &format!("{:?}", note.draft));
        }

        section("Pinned (by priority)");
        for note in &pinned {
            summary_row(&format!("#{}", note.id()), &format!("{} [p{}]", note.title, note.priority));
        }

        section("First page (3 per page)");
        for note in &first_page {
            summary_row(&format!("#{}", note.id()), &note.title);
        }

        println!();
        success(&format!("{} rows across {} tables", stats.total_rows(), stats.tables.len()));
    } else {
        let data = serde_json::json!({
            "removed": removed,
            "saved": saved.iter().map(Note::to_json).collect::<Vec<_>>(),
            "total": total,
            "pinned": pinned.iter().map(Note::to_json).collect::<Vec<_>>(),
            "first_page": first_page.iter().map(Note::to_json).collect::<Vec<_>>(),
            "reloaded": reloaded.as_ref().map(Note::to_json),
            "stats": stats,
        });
        emit_success(output_mode, "demo", data)?;
    }
    Ok(())
}
