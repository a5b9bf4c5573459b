//! # Seed Data Generator
//!
//! Populates the database with reference data and assets for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 assets (default)
//! cargo run -p keeper-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p keeper-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p keeper-db --bin seed -- --db ./data/keeper.db
//! ```
//!
//! ## Generated Data
//! - One company, supplier, three manufacturers and categories
//! - Four locations and the three classic status labels
//! - A "Computers" fieldset with a required `mac_address` column
//! - A handful of people
//! - N assets, tagged `{MODEL}-{INDEX}`; every fifth one checked out

use std::env;

use chrono::{Duration, Utc};
use keeper_core::lifecycle::{self, CheckoutGuard, CheckoutRequest, NewAsset};
use keeper_core::{
    Actor, AssetModel, CheckoutTarget, CompanyScope, CustomFieldDef, Fieldset, Location,
    StatusLabel, User,
};
use keeper_db::{Database, DbConfig, NamedTable};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const COMPANY_ID: &str = "company-acme";
const SUPPLIER_ID: &str = "supplier-northwind";
const STATUS_READY: &str = "status-ready";
const STATUS_PENDING: &str = "status-pending";
const STATUS_ARCHIVED: &str = "status-archived";

/// Model prefix, name, model number, manufacturer, category, base cost in cents.
const MODELS: &[(&str, &str, &str, &str, &str, i64)] = &[
    ("LPT", "Latitude 7440", "D-7440", "Dell", "Laptops", 1_349_00),
    ("MBP", "MacBook Pro 14", "A2992", "Apple", "Laptops", 1_999_00),
    ("MON", "UltraSharp 27", "U2724D", "Dell", "Monitors", 429_00),
    ("PHN", "Pixel 8", "GKWS6", "Google", "Phones", 699_00),
    ("TAB", "iPad Air", "A2588", "Apple", "Tablets", 599_00),
];

const LOCATIONS: &[(&str, &str)] = &[
    ("loc-hq", "Headquarters"),
    ("loc-lab", "Hardware Lab"),
    ("loc-warehouse", "Warehouse"),
    ("loc-remote", "Remote"),
];

const PEOPLE: &[(&str, &str)] = &[
    ("Ada", "Lovelace"),
    ("Grace", "Hopper"),
    ("Alan", "Turing"),
    ("Edsger", "Dijkstra"),
    ("Barbara", "Liskov"),
    ("Ken", "Thompson"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keeper=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./keeper_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Keeper Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of assets to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./keeper_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.assets().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has assets, skipping seed");
        return Ok(());
    }

    let (models, people) = seed_reference_data(&db).await?;
    info!(models = models.len(), people = people.len(), "Reference data ready");

    let actor = Actor::superuser("seed");
    let scope = CompanyScope::default();
    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut checked_out = 0;

    for index in 0..count {
        let (prefix, model) = &models[index % models.len()];
        let (_, _, _, _, _, base_cost) = MODELS[index % MODELS.len()];
        let now = Utc::now() - Duration::days((index % 700) as i64);

        let mut input = NewAsset {
            name: Some(format!("{} #{}", model.name, index + 1)),
            asset_tag: format!("{}-{:05}", prefix, index + 1),
            serial: Some(format!("SN{:08}", index * 7919 % 100_000_000)),
            order_number: Some(format!("PO-{}", 1000 + index / 25)),
            model_id: model.id.clone(),
            status_id: match index % 10 {
                8 => STATUS_PENDING,
                9 => STATUS_ARCHIVED,
                _ => STATUS_READY,
            }
            .to_string(),
            company_id: Some(COMPANY_ID.to_string()),
            supplier_id: Some(SUPPLIER_ID.to_string()),
            rtd_location_id: Some(LOCATIONS[index % LOCATIONS.len()].0.to_string()),
            requestable: index % 3 == 0,
            purchase_cost: Some(format!("{:.2}", (base_cost + (index as i64 % 50) * 100) as f64 / 100.0)),
            purchase_date: Some(now.date_naive().to_string()),
            warranty_months: Some(36),
            ..Default::default()
        };
        if model.fieldset.is_some() {
            input.custom_fields.insert(
                "mac_address".to_string(),
                format!("00:1B:44:{:02X}:{:02X}:{:02X}", index % 256, (index / 256) % 256, index % 97),
            );
        }

        let (mut asset, log) = match lifecycle::build_asset(&input, model, &actor, scope, now) {
            Ok(built) => built,
            Err(errors) => {
                warn!(tag = %input.asset_tag, %errors, "Skipping invalid asset");
                continue;
            }
        };

        if let Err(e) = db.assets().insert(&asset, &log).await {
            warn!(tag = %asset.asset_tag, error = %e, "Failed to insert asset");
            continue;
        }
        generated += 1;

        if index % 5 == 0 && input.status_id == STATUS_READY {
            let person = &people[index % people.len()];
            let target = CheckoutTarget::User(person.clone());
            let request = CheckoutRequest::at(now + Duration::hours(2)).with_note("Seeded checkout");
            let log = lifecycle::check_out(&mut asset, &target, &actor, &request, CheckoutGuard::Available)?;
            if db.assets().check_out(&asset, &log).await? {
                checked_out += 1;
            }
        }

        if generated % 100 == 0 {
            info!(generated, "Progress");
        }
    }

    let elapsed = start.elapsed();
    info!(
        generated,
        checked_out,
        elapsed_ms = elapsed.as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

/// Inserts everything assets point at. Returns models keyed by tag prefix
/// and the people assets can be checked out to.
async fn seed_reference_data(
    db: &Database,
) -> Result<(Vec<(&'static str, AssetModel)>, Vec<User>), Box<dyn std::error::Error>> {
    let catalog = db.catalog();

    catalog.insert_named(NamedTable::Companies, COMPANY_ID, "Acme Corp").await?;
    catalog.insert_named(NamedTable::Suppliers, SUPPLIER_ID, "Northwind Traders").await?;

    for (id, name) in LOCATIONS {
        catalog
            .insert_location(&Location {
                id: id.to_string(),
                name: name.to_string(),
            })
            .await?;
    }

    for (id, name, deployable, pending, archived) in [
        (STATUS_READY, "Ready to Deploy", true, false, false),
        (STATUS_PENDING, "Pending", false, true, false),
        (STATUS_ARCHIVED, "Archived", false, false, true),
    ] {
        catalog
            .insert_status_label(&StatusLabel {
                id: id.to_string(),
                name: name.to_string(),
                deployable,
                pending,
                archived,
            })
            .await?;
    }

    let computers = Fieldset {
        id: "fieldset-computers".to_string(),
        name: "Computers".to_string(),
        fields: vec![
            CustomFieldDef {
                id: "field-mac".to_string(),
                name: "MAC Address".to_string(),
                column: "mac_address".to_string(),
                required: true,
            },
            CustomFieldDef {
                id: "field-ram".to_string(),
                name: "RAM".to_string(),
                column: "ram".to_string(),
                required: false,
            },
        ],
    };
    catalog.insert_fieldset(&computers).await?;

    let mut known = Vec::new();
    let mut models = Vec::new();
    for (prefix, name, number, manufacturer, category, _) in MODELS {
        let manufacturer_id = format!("mfr-{}", manufacturer.to_lowercase());
        let category_id = format!("cat-{}", category.to_lowercase());
        if !known.contains(&manufacturer_id) {
            catalog.insert_named(NamedTable::Manufacturers, &manufacturer_id, manufacturer).await?;
            known.push(manufacturer_id.clone());
        }
        if !known.contains(&category_id) {
            catalog.insert_named(NamedTable::Categories, &category_id, category).await?;
            known.push(category_id.clone());
        }

        let model = AssetModel {
            id: format!("model-{}", prefix.to_lowercase()),
            name: name.to_string(),
            model_number: Some(number.to_string()),
            category_id: Some(category_id),
            manufacturer_id: Some(manufacturer_id),
            checkin_email: *category == "Laptops",
            fieldset: (*category == "Laptops").then(|| computers.clone()),
        };
        catalog.insert_model(&model).await?;
        models.push((*prefix, model));
    }

    let mut people = Vec::new();
    for (index, (first, last)) in PEOPLE.iter().enumerate() {
        let user = User {
            id: format!("user-{}", first.to_lowercase()),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: Some(format!("{}@acme.example", first.to_lowercase())),
            company_id: Some(COMPANY_ID.to_string()),
            location_id: Some(LOCATIONS[index % LOCATIONS.len()].0.to_string()),
        };
        catalog.insert_user(&user).await?;
        people.push(user);
    }

    Ok((models, people))
}
