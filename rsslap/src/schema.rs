//! DDL and pre-population statements for the test table.
use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rsslap_core::{
    AutoGenerate, RsslapError, TaskSpec, Workload, CHAR_COL_WIDTH, CHAR_VALUE_LEN, GUID_WIDTH,
    TABLE_NAME,
};
use uuid::Uuid;

/// High word of the GUIDs assigned to pre-populated rows.
const PREPOPULATED_GUID_HIGH: u64 = 0x7273_736c_6170_0000;

/// Layout of the auto-generated table and the statements that address it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    int_cols: u32,
    char_cols: u32,
    guid_primary: bool,
}

impl Table {
    pub fn new(auto: &AutoGenerate) -> Self {
        Self {
            int_cols: auto.int_cols,
            char_cols: auto.char_cols,
            guid_primary: auto.guid_primary,
        }
    }

    fn int_columns(&self) -> impl Iterator<Item = String> {
        (1..=self.int_cols).map(|i| format!("intcol{i}"))
    }

    fn char_columns(&self) -> impl Iterator<Item = String> {
        (1..=self.char_cols).map(|i| format!("charcol{i}"))
    }

    /// Non-key columns, INT columns first.
    pub fn columns(&self) -> Vec<String> {
        self.int_columns().chain(self.char_columns()).collect()
    }

    pub fn create_table(&self) -> String {
        let key = if self.guid_primary {
            format!("id VARCHAR({GUID_WIDTH}) PRIMARY KEY")
        } else {
            "id BIGINT PRIMARY KEY".to_string()
        };

        let mut defs = vec![key];
        defs.extend(self.int_columns().map(|c| format!("{c} INT")));
        defs.extend(
            self.char_columns()
                .map(|c| format!("{c} VARCHAR({CHAR_COL_WIDTH})")),
        );

        format!("CREATE TABLE {} ({})", TABLE_NAME, defs.join(", "))
    }

    /// Key literal of the pre-populated row at `index`.
    pub fn existing_key(&self, index: u64) -> String {
        if self.guid_primary {
            format!("'{}'", Uuid::from_u64_pair(PREPOPULATED_GUID_HIGH, index))
        } else {
            index.to_string()
        }
    }

    /// Key literal for a new row. Integer keys are `ordinal`; GUID keys are
    /// drawn from `rng`.
    pub fn fresh_key(&self, ordinal: u64, rng: &mut SmallRng) -> String {
        if self.guid_primary {
            let uuid = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
            format!("'{uuid}'")
        } else {
            ordinal.to_string()
        }
    }

    fn random_values(&self, rng: &mut SmallRng) -> Vec<String> {
        let mut values: Vec<String> = (0..self.int_cols)
            .map(|_| rng.gen::<i32>().to_string())
            .collect();
        values.extend((0..self.char_cols).map(|_| format!("'{}'", random_chars(rng))));
        values
    }

    pub fn insert(&self, key: &str, rng: &mut SmallRng) -> String {
        let mut values = vec![key.to_string()];
        values.extend(self.random_values(rng));
        format!(
            "INSERT INTO {} (id, {}) VALUES ({})",
            TABLE_NAME,
            self.columns().join(", "),
            values.join(", ")
        )
    }

    /// Every non-key column of the row with `key`.
    pub fn select_row(&self, key: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE id = {}",
            self.columns().join(", "),
            TABLE_NAME,
            key
        )
    }

    /// Primary key lookup touching nothing but the key.
    pub fn select_key(&self, key: &str) -> String {
        format!("SELECT id FROM {TABLE_NAME} WHERE id = {key}")
    }

    pub fn update_row(&self, key: &str, rng: &mut SmallRng) -> String {
        let assignments: Vec<String> = self
            .columns()
            .into_iter()
            .zip(self.random_values(rng))
            .map(|(c, v)| format!("{c} = {v}"))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE id = {}",
            TABLE_NAME,
            assignments.join(", "),
            key
        )
    }
}

fn random_chars(rng: &mut SmallRng) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(CHAR_VALUE_LEN)
        .map(char::from)
        .collect()
}

/// Statements that prepare the database before agents start.
#[derive(Debug, Clone)]
pub struct SchemaGenerator {
    table: Option<Table>,
    creates: Vec<String>,
    prepopulated_rows: u64,
    seed: u64,
}

impl SchemaGenerator {
    pub fn new(spec: &TaskSpec) -> Result<Self, RsslapError> {
        match spec.workload() {
            Workload::Explicit { creates, .. } => Ok(Self {
                table: None,
                creates: creates.clone(),
                prepopulated_rows: 0,
                seed: spec.seed(),
            }),
            Workload::Auto(auto) => {
                let table = Table::new(auto);
                let mut creates = vec![table.create_table()];
                creates.extend(index_statements(auto)?);

                Ok(Self {
                    table: Some(table),
                    creates,
                    prepopulated_rows: auto.prepopulated_rows,
                    seed: spec.seed(),
                })
            }
        }
    }

    /// The generated table, `None` for explicit workloads.
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// DDL in execution order.
    pub fn create_statements(&self) -> &[String] {
        &self.creates
    }

    pub fn prepopulated_rows(&self) -> u64 {
        self.prepopulated_rows
    }

    /// One INSERT per pre-populated row, keyed `0..prepopulated_rows`.
    pub fn populate_statements(&self) -> impl Iterator<Item = String> + '_ {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let rows = if self.table.is_some() {
            self.prepopulated_rows
        } else {
            0
        };

        (0..rows).filter_map(move |i| {
            let table = self.table.as_ref()?;
            Some(table.insert(&table.existing_key(i), &mut rng))
        })
    }
}

fn index_statements(auto: &AutoGenerate) -> Result<Vec<String>, RsslapError> {
    let table = Table::new(auto);
    let mut statements = vec![];
    let mut unindexed = vec![];

    let int_cols = table.int_columns().map(|c| (c, auto.int_cols_index));
    let char_cols = table.char_columns().map(|c| (c, auto.char_cols_index));
    for (column, indexed) in int_cols.chain(char_cols) {
        if indexed {
            statements.push(format!(
                "CREATE INDEX {TABLE_NAME}_{column}_idx ON {TABLE_NAME} ({column})"
            ));
        } else {
            unindexed.push(column);
        }
    }

    let requested = auto.secondary_indexes as usize;
    if requested > unindexed.len() {
        return Err(RsslapError::SchemaBuild(format!(
            "{requested} secondary indexes requested but only {} unindexed columns are available",
            unindexed.len()
        )));
    }

    statements.extend(unindexed.iter().take(requested).enumerate().map(|(n, column)| {
        format!(
            "CREATE INDEX {TABLE_NAME}_secondary{}_idx ON {TABLE_NAME} ({column})",
            n + 1
        )
    }));

    Ok(statements)
}
