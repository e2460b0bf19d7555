use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Product-to-product recommendations for one source product
    Similar {
        product_id: i64,

        /// related, crosssell or upsell
        #[arg(short = 't', long = "type", default_value = "related")]
        rec_type: String,

        #[arg(long)]
        num: Option<usize>,

        #[arg(short, long, default_value = "1")]
        store: u32,

        /// Shopper identity; omitted means an anonymous guest
        #[arg(short, long)]
        customer: Option<i64>,

        /// Product ids already in the cart, comma separated
        #[arg(long, value_delimiter = ',')]
        cart: Vec<i64>,

        /// Show similarity scores and metadata
        #[arg(long)]
        scores: bool,
    },

    /// Free-text similarity search over the catalog
    Search {
        query: String,

        #[arg(long, default_value = "10")]
        num: usize,

        #[arg(short, long, default_value = "1")]
        store: u32,
    },

    /// Behavior-based recommendations for a customer or guest session
    Personalized {
        /// browsing, purchase, wishlist or just_for_you
        #[arg(short = 't', long = "type", default_value = "just_for_you")]
        profile_type: String,

        #[arg(short, long)]
        customer: Option<i64>,

        #[arg(long)]
        session: Option<String>,

        #[arg(long)]
        num: Option<usize>,

        #[arg(short, long, default_value = "1")]
        store: u32,

        /// Product ids to leave out, comma separated
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<i64>,
    },

    /// Check the vector store, embedding service and LLM provider
    TestConnection,

    /// Recompute trending scores from recent orders
    RefreshTrending {
        /// Only this store; every known store when omitted
        #[arg(short, long)]
        store: Option<u32>,

        #[arg(long)]
        period_days: Option<u32>,
    },

    /// Rebuild customer profiles that have not been updated recently
    RefreshProfiles {
        #[arg(long)]
        max_age_hours: Option<i64>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Invalidate cached recommendations
    ClearCache {
        #[arg(long, conflicts_with_all = ["customer", "all"])]
        product: Option<i64>,

        #[arg(long, conflicts_with = "all")]
        customer: Option<i64>,

        /// Profile type to clear for --customer; all types when omitted
        #[arg(short = 't', long = "type", requires = "customer")]
        profile_type: Option<String>,

        #[arg(long)]
        all: bool,
    },

    /// Delete expired ranking records and personalized cache entries
    CleanExpired,
}
