//! Postgres schema, applied idempotently at startup.
//!
//! Constraints back up the engine rules: the stock floor, slug uniqueness, one
//! review per (product slug, email), and order items pinning their products.

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id              UUID PRIMARY KEY,
        slug            TEXT NOT NULL UNIQUE,
        name            TEXT NOT NULL,
        price           BIGINT NOT NULL CHECK (price >= 0),
        discount_price  BIGINT CHECK (discount_price IS NULL OR discount_price >= 0),
        stock_quantity  BIGINT NOT NULL CHECK (stock_quantity >= 0),
        in_stock        BOOLEAN NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id            UUID PRIMARY KEY,
        order_number  TEXT NOT NULL UNIQUE,
        customer_id   UUID,
        status        TEXT NOT NULL CHECK (status IN ('pending', 'processing', 'shipped', 'delivered', 'cancelled')),
        total         BIGINT NOT NULL CHECK (total >= 0),
        shipping      JSONB NOT NULL DEFAULT 'null'::jsonb,
        billing       JSONB NOT NULL DEFAULT 'null'::jsonb,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        order_id      UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        line_no       INTEGER NOT NULL,
        product_id    UUID NOT NULL REFERENCES products(id) ON DELETE RESTRICT,
        product_slug  TEXT NOT NULL,
        quantity      BIGINT NOT NULL CHECK (quantity > 0),
        unit_price    BIGINT NOT NULL CHECK (unit_price >= 0),
        PRIMARY KEY (order_id, line_no)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS order_items_product_idx ON order_items (product_id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS orders_customer_idx ON orders (customer_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id                 UUID PRIMARY KEY,
        product_id         UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        product_slug       TEXT NOT NULL,
        customer_email     TEXT NOT NULL,
        customer_id        UUID,
        rating             SMALLINT NOT NULL CHECK (rating BETWEEN 1 AND 5),
        comment            TEXT NOT NULL,
        verified_purchase  BOOLEAN NOT NULL,
        created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (product_slug, customer_email)
    )
    "#,
];
