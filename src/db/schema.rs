pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- companies table (maintained by the admin surface)
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    feeds TEXT NOT NULL DEFAULT '[]',
    priority INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    context TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_companies_active ON companies(is_active);

-- raw_items table (audit trail of every fetched story)
CREATE TABLE IF NOT EXISTS raw_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    snippet TEXT NOT NULL,
    source TEXT NOT NULL,
    published_at TEXT,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(run_id, company_id, link)
);

CREATE INDEX IF NOT EXISTS idx_raw_items_company ON raw_items(company_id);

-- enriched_articles table (upserted by stable id)
CREATE TABLE IF NOT EXISTS enriched_articles (
    id TEXT PRIMARY KEY,
    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    original_title TEXT NOT NULL,
    translated_title TEXT NOT NULL,
    summary TEXT NOT NULL,
    headline TEXT NOT NULL,
    importance INTEGER NOT NULL,
    categories TEXT NOT NULL,
    published_at TEXT NOT NULL,
    source_links TEXT NOT NULL,
    model_version TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_enriched_articles_published_at ON enriched_articles(published_at DESC);
CREATE INDEX IF NOT EXISTS idx_enriched_articles_company ON enriched_articles(company_id);

-- collection_logs table (append-only)
CREATE TABLE IF NOT EXISTS collection_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    company_id INTEGER NOT NULL,
    company_name TEXT NOT NULL,
    status TEXT NOT NULL,
    items_fetched INTEGER NOT NULL,
    articles_produced INTEGER NOT NULL,
    error_code TEXT,
    error_message TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

-- delivery_logs table (append-only)
CREATE TABLE IF NOT EXISTS delivery_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    report_kind TEXT NOT NULL,
    channel TEXT NOT NULL,
    thread_count INTEGER NOT NULL,
    article_count INTEGER NOT NULL,
    status TEXT NOT NULL,
    error_code TEXT,
    error_message TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

-- single-row settings tables
CREATE TABLE IF NOT EXISTS channel_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    channel_id TEXT NOT NULL,
    channel_name TEXT,
    thread_strategy TEXT NOT NULL DEFAULT 'overflow',
    mention_user_id TEXT,
    updated_by TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS escalation_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    mention_handle TEXT NOT NULL,
    fallback_channel TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
