use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate, TimeZone};
use reqwest::{Method, RequestBuilder, StatusCode};

use kcal_core::aggregate::{DateRange, filter_range};
use kcal_core::backend::{
    parse_entry, parse_entry_list, parse_ingredient, parse_ingredient_list, parse_metrics,
    parse_profile, parse_weight, parse_weight_list,
};
use kcal_core::ingredient_cache::IngredientProvider;
use kcal_core::models::{Entry, Ingredient, NewEntry, NewIngredient, NewWeightEntry, WeightEntry};
use kcal_core::profile::{HealthMetrics, Profile, ProfileUpdate};

/// HTTP client for the calorie backend.
///
/// Methods block on the runtime handle they were built with, so they must be
/// called from outside that runtime's worker threads.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    rt: tokio::runtime::Handle,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, rt: tokio::runtime::Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("kcal-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            rt,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send and return the body of a 2xx response; `Ok(None)` for 404.
    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Option<Vec<u8>>> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach backend ({what})"))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body = body.trim();
            if body.is_empty() {
                bail!("Failed to {what}: HTTP {status}");
            }
            bail!("Failed to {what}: HTTP {status}: {body}");
        }
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read response ({what})"))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn send_found(&self, req: RequestBuilder, what: &str) -> Result<Vec<u8>> {
        self.send(req, what)
            .await?
            .with_context(|| format!("Failed to {what}: not found"))
    }

    // --- Ingredients ---

    pub async fn fetch_ingredients_async(&self) -> Result<Vec<Ingredient>> {
        let body = self
            .send_found(self.request(Method::GET, "/api/ingredients"), "fetch ingredients")
            .await?;
        parse_ingredient_list(&body)
    }

    pub async fn search_ingredients_async(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Ingredient>> {
        let req = self
            .request(Method::GET, "/api/ingredients/search")
            .query(&[("q", query.to_string()), ("limit", limit.to_string())]);
        let body = self.send_found(req, "search ingredients").await?;
        parse_ingredient_list(&body)
    }

    pub async fn get_ingredient_async(&self, id: i64) -> Result<Option<Ingredient>> {
        let req = self.request(Method::GET, &format!("/api/ingredients/{id}"));
        match self.send(req, "fetch ingredient").await? {
            Some(body) => parse_ingredient(&body).map(Some),
            None => Ok(None),
        }
    }

    pub async fn create_ingredient_async(&self, new: &NewIngredient) -> Result<Ingredient> {
        let req = self.request(Method::POST, "/api/ingredients").json(new);
        let body = self.send_found(req, "create ingredient").await?;
        parse_ingredient(&body)
    }

    pub async fn update_ingredient_async(&self, id: i64, new: &NewIngredient) -> Result<Ingredient> {
        let req = self
            .request(Method::PUT, &format!("/api/ingredients/{id}"))
            .json(new);
        let body = self.send_found(req, "update ingredient").await?;
        parse_ingredient(&body)
    }

    pub async fn delete_ingredient_async(&self, id: i64) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("/api/ingredients/{id}"));
        self.send_found(req, "delete ingredient").await?;
        Ok(())
    }

    // --- Calorie entries ---

    pub fn entries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Entry>> {
        self.rt.block_on(async {
            let req = self.request(Method::GET, "/api/calories").query(&[
                ("dateFrom", from.format("%Y-%m-%d").to_string()),
                ("dateTo", to.format("%Y-%m-%d").to_string()),
            ]);
            let body = self.send_found(req, "fetch calorie entries").await?;
            parse_entry_list(&body)
        })
    }

    /// Entries whose local calendar date in `tz` falls inside `range`.
    ///
    /// The backend matches on the UTC date, which can differ from the local
    /// one by a day either way, so the query is widened and then narrowed.
    pub fn entries_in_local_range<Tz: TimeZone>(
        &self,
        range: DateRange,
        tz: &Tz,
    ) -> Result<Vec<Entry>> {
        let from = range.from - Duration::days(1);
        let to = range.to + Duration::days(1);
        let entries = self.entries(from, to)?;
        Ok(filter_range(&entries, tz, range))
    }

    pub fn create_entry(&self, entry: &NewEntry) -> Result<Entry> {
        self.rt.block_on(async {
            let req = self.request(Method::POST, "/api/calories").json(entry);
            let body = self.send_found(req, "add entry").await?;
            parse_entry(&body)
        })
    }

    pub fn update_entry(&self, id: i64, entry: &NewEntry) -> Result<Entry> {
        self.rt.block_on(async {
            let req = self
                .request(Method::PUT, &format!("/api/calories/{id}"))
                .json(entry);
            let body = self.send_found(req, "update entry").await?;
            parse_entry(&body)
        })
    }

    pub fn delete_entry(&self, id: i64) -> Result<()> {
        self.rt.block_on(async {
            let req = self.request(Method::DELETE, &format!("/api/calories/{id}"));
            self.send_found(req, "delete entry").await?;
            Ok(())
        })
    }

    // --- Weight ---

    pub fn weight_history(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<WeightEntry>> {
        self.rt.block_on(async {
            let mut params = Vec::new();
            if let Some(from) = from {
                params.push(("from", from.format("%Y-%m-%d").to_string()));
            }
            if let Some(to) = to {
                params.push(("to", to.format("%Y-%m-%d").to_string()));
            }
            let req = self.request(Method::GET, "/api/weight").query(&params);
            let body = self.send_found(req, "fetch weight history").await?;
            parse_weight_list(&body)
        })
    }

    pub fn create_weight(&self, entry: &NewWeightEntry) -> Result<WeightEntry> {
        self.rt.block_on(async {
            let req = self.request(Method::POST, "/api/weight").json(entry);
            let body = self.send_found(req, "log weight").await?;
            parse_weight(&body)
        })
    }

    pub fn delete_weight(&self, id: i64) -> Result<()> {
        self.rt.block_on(async {
            let req = self.request(Method::DELETE, &format!("/api/weight/{id}"));
            self.send_found(req, "delete weight entry").await?;
            Ok(())
        })
    }

    // --- Profile ---

    pub fn profile(&self) -> Result<Profile> {
        self.rt.block_on(async {
            let req = self.request(Method::GET, "/api/profile");
            let body = self.send_found(req, "fetch profile").await?;
            parse_profile(&body)
        })
    }

    pub fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
        self.rt.block_on(async {
            let req = self.request(Method::PUT, "/api/profile").json(update);
            let body = self.send_found(req, "update profile").await?;
            parse_profile(&body)
        })
    }

    pub fn health_metrics(&self) -> Result<HealthMetrics> {
        self.rt.block_on(async {
            let req = self.request(Method::GET, "/api/metrics");
            let body = self.send_found(req, "fetch health metrics").await?;
            parse_metrics(&body)
        })
    }
}

impl IngredientProvider for ApiClient {
    fn fetch_all(&self) -> Result<Vec<Ingredient>> {
        self.rt.block_on(self.fetch_ingredients_async())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<Ingredient>> {
        self.rt.block_on(self.search_ingredients_async(query, limit))
    }

    fn get(&self, id: i64) -> Result<Option<Ingredient>> {
        self.rt.block_on(self.get_ingredient_async(id))
    }

    fn create(&self, ingredient: &NewIngredient) -> Result<Ingredient> {
        self.rt.block_on(self.create_ingredient_async(ingredient))
    }

    fn update(&self, id: i64, ingredient: &NewIngredient) -> Result<Ingredient> {
        self.rt.block_on(self.update_ingredient_async(id, ingredient))
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.rt.block_on(self.delete_ingredient_async(id))
    }
}
