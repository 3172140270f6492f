use crate::DEFAULT_COINBASE_MATURITY;

/// Configuration options for the wallet transaction store.
#[derive(Clone, Debug)]
pub struct TxStoreOptions {
    /// Confirmations a coinbase output needs before it is spendable (default: 100)
    pub coinbase_maturity: u32,

    /// Whether to create the database if it does not exist
    pub create_if_missing: bool,

    /// Size of a single memtable in bytes
    pub write_buffer_size: usize,

    /// Whether to compress stored blocks with LZ4
    pub compression: bool,
}

impl Default for TxStoreOptions {
    fn default() -> Self {
        Self {
            coinbase_maturity: DEFAULT_COINBASE_MATURITY,
            create_if_missing: true,
            write_buffer_size: 64 << 20, // 64 MB
            compression: true,
        }
    }
}

impl TxStoreOptions {
    /// Create new store options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for configuring store options
    pub fn builder() -> TxStoreOptionsBuilder {
        TxStoreOptionsBuilder::default()
    }

    pub(crate) fn db_options(&self) -> rocksdb::Options {
        let mut db_opts = rocksdb::Options::default();
        db_opts.create_if_missing(self.create_if_missing);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(self.write_buffer_size);
        if self.compression {
            db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        } else {
            db_opts.set_compression_type(rocksdb::DBCompressionType::None);
        }
        db_opts
    }
}

/// Builder pattern for TxStoreOptions
#[derive(Default)]
pub struct TxStoreOptionsBuilder {
    options: TxStoreOptions,
}

impl TxStoreOptionsBuilder {
    /// Set the coinbase maturity
    pub fn coinbase_maturity(mut self, confirmations: u32) -> Self {
        self.options.coinbase_maturity = confirmations;
        self
    }

    /// Set whether a missing database is created
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.options.create_if_missing = create;
        self
    }

    /// Set the memtable size in bytes
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.options.write_buffer_size = size;
        self
    }

    /// Enable or disable LZ4 compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.options.compression = enabled;
        self
    }

    /// Build the final TxStoreOptions
    pub fn build(self) -> TxStoreOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txstore_options_builder() {
        let options = TxStoreOptions::builder()
            .coinbase_maturity(20)
            .create_if_missing(false)
            .write_buffer_size(1 << 20)
            .compression(false)
            .build();

        assert_eq!(options.coinbase_maturity, 20);
        assert!(!options.create_if_missing);
        assert_eq!(options.write_buffer_size, 1 << 20);
        assert!(!options.compression);
    }

    #[test]
    fn test_txstore_options_defaults() {
        let options = TxStoreOptions::default();

        assert_eq!(options.coinbase_maturity, 100);
        assert!(options.create_if_missing);
        assert_eq!(options.write_buffer_size, 64 * 1024 * 1024);
        assert!(options.compression);
    }
}
