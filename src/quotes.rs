// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use csv::ReaderBuilder;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::models::StockPriceData;
use crate::utils::http_client;

const NSE_QUOTE_API: &str = "https://www.nseindia.com/api/quote-equity";
const NSE_QUOTE_PAGE: &str = "https://www.nseindia.com/get-quotes/equity";
const NSE_REFERER: &str = "https://www.nseindia.com/";
pub const EQUITY_LIST_URL: &str = "https://nsearchives.nseindia.com/content/equities/EQUITY_L.csv";

pub trait QuoteProvider {
    /// `Ok(None)` when the symbol is unknown to the provider.
    fn fetch_price(&self, symbol: &str) -> Result<Option<StockPriceData>>;

    /// Symbols that fail or have no quote are left out of the map.
    fn fetch_many(&self, symbols: &[String]) -> BTreeMap<String, StockPriceData> {
        let mut out = BTreeMap::new();
        for symbol in symbols {
            match self.fetch_price(symbol) {
                Ok(Some(q)) => {
                    out.insert(symbol.clone(), q);
                }
                Ok(None) => debug!(symbol = %symbol, "no quote"),
                Err(e) => warn!(symbol = %symbol, error = %e, "quote fetch failed"),
            }
        }
        out
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct NseQuote {
    #[serde(default)]
    priceInfo: Option<NsePriceInfo>,
    #[serde(default)]
    metadata: Option<NseMetadata>,
    #[serde(default)]
    securityWiseDP: Option<NseDeliveryInfo>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct NsePriceInfo {
    lastPrice: Option<f64>,
    change: Option<f64>,
    pChange: Option<f64>,
    intraDayHighLow: Option<NseHighLow>,
}

#[derive(Debug, Deserialize)]
struct NseHighLow {
    max: Option<f64>,
    min: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct NseMetadata {
    lastUpdateTime: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct NseDeliveryInfo {
    quantityTraded: Option<f64>,
}

fn dec(v: Option<f64>) -> Decimal {
    v.and_then(Decimal::from_f64_retain)
        .map(|d| d.round_dp(4))
        .unwrap_or(Decimal::ZERO)
}

fn quote_from_api(symbol: &str, q: NseQuote) -> Option<StockPriceData> {
    let price = q.priceInfo?;
    let last_price = dec(price.lastPrice);
    if last_price.is_zero() {
        return None;
    }
    let (high, low) = price
        .intraDayHighLow
        .map(|hl| (dec(hl.max), dec(hl.min)))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));
    Some(StockPriceData {
        symbol: symbol.to_string(),
        last_price,
        change: dec(price.change),
        percent_change: dec(price.pChange),
        day_high: high,
        day_low: low,
        volume: dec(q.securityWiseDP.and_then(|d| d.quantityTraded)),
        last_update: q
            .metadata
            .and_then(|m| m.lastUpdateTime)
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    })
}

/// Pulls `priceInfo.lastPrice` out of the quote page, preferring the block for `symbol`.
pub fn scrape_last_price(html: &str, symbol: &str) -> Option<Decimal> {
    let scoped = Regex::new(&format!(
        r#"(?is)"symbol"\s*:\s*"{}".{{0,2000}}?"priceInfo"\s*:\s*\{{.*?"lastPrice"\s*:\s*"?([\d,]+(?:\.\d+)?)"?"#,
        regex::escape(symbol)
    ))
    .ok()?;
    let any = Regex::new(r#"(?is)"priceInfo"\s*:\s*\{.*?"lastPrice"\s*:\s*"?([\d,]+(?:\.\d+)?)"?"#).ok()?;
    let caps = scoped.captures(html).or_else(|| any.captures(html))?;
    let raw = caps.get(1)?.as_str().replace(',', "");
    raw.parse::<Decimal>().ok().filter(|d| !d.is_zero())
}

/// Exchange quote API with a fallback to scraping the public quote page.
pub struct NseQuoteProvider {
    client: reqwest::blocking::Client,
}

impl NseQuoteProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }

    fn from_api(&self, symbol: &str) -> Result<Option<StockPriceData>> {
        let resp = self
            .client
            .get(NSE_QUOTE_API)
            .query(&[("symbol", symbol)])
            .header("referer", NSE_REFERER)
            .header("accept", "application/json, text/plain, */*")
            .send()?
            .error_for_status()?;
        let q: NseQuote = resp.json()?;
        Ok(quote_from_api(symbol, q))
    }

    fn from_page(&self, symbol: &str) -> Result<Option<StockPriceData>> {
        let html = self
            .client
            .get(NSE_QUOTE_PAGE)
            .query(&[("symbol", symbol)])
            .header("referer", NSE_REFERER)
            .header("accept", "text/html,application/xhtml+xml")
            .send()?
            .error_for_status()?
            .text()?;
        Ok(scrape_last_price(&html, symbol).map(|last_price| StockPriceData {
            symbol: symbol.to_string(),
            last_price,
            change: Decimal::ZERO,
            percent_change: Decimal::ZERO,
            day_high: Decimal::ZERO,
            day_low: Decimal::ZERO,
            volume: Decimal::ZERO,
            last_update: Utc::now().to_rfc3339(),
        }))
    }
}

impl QuoteProvider for NseQuoteProvider {
    fn fetch_price(&self, symbol: &str) -> Result<Option<StockPriceData>> {
        match self.from_api(symbol) {
            Ok(Some(q)) => Ok(Some(q)),
            Ok(None) => self.from_page(symbol),
            Err(e) => {
                debug!(symbol, error = %e, "quote API failed, trying quote page");
                self.from_page(symbol)
                    .with_context(|| format!("Failed to fetch quote for {}", symbol))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub symbol: String,
    pub name: String,
}

/// Symbol to company-name table from the exchange equity list.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let headers: Vec<String> = rdr
            .headers()
            .context("Symbol list has no header row")?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let sym_idx = headers
            .iter()
            .position(|h| h == "symbol")
            .ok_or_else(|| anyhow!("Symbol list is missing a SYMBOL column"))?;
        let name_idx = headers
            .iter()
            .position(|h| matches!(h.as_str(), "name of company" | "name" | "company name"))
            .ok_or_else(|| anyhow!("Symbol list is missing a company name column"))?;

        let mut entries = Vec::new();
        for rec in rdr.records() {
            let rec = rec?;
            let symbol = rec.get(sym_idx).unwrap_or("").trim();
            let name = rec.get(name_idx).unwrap_or("").trim();
            if !symbol.is_empty() && !name.is_empty() {
                entries.push(SymbolEntry {
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("Open symbol list {}", path.display()))?;
        Self::from_reader(f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact company-name match first, then the first name containing the query.
    pub fn suggest(&self, company: &str) -> Option<&SymbolEntry> {
        let q = company.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.name.to_lowercase() == q)
            .or_else(|| self.entries.iter().find(|e| e.name.to_lowercase().contains(&q)))
    }

    /// Matches on symbol or company name, symbol prefix hits first.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&SymbolEntry> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<(u8, &SymbolEntry)> = self
            .entries
            .iter()
            .filter_map(|e| {
                let sym = e.symbol.to_lowercase();
                let name = e.name.to_lowercase();
                if sym == q {
                    Some((0, e))
                } else if sym.starts_with(&q) {
                    Some((1, e))
                } else if name.contains(&q) || sym.contains(&q) {
                    Some((2, e))
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by_key(|(rank, _)| *rank);
        hits.into_iter().take(limit).map(|(_, e)| e).collect()
    }
}

/// Downloads the exchange equity list to `target`, returning bytes written.
pub fn refresh_symbol_list(target: &Path) -> Result<usize> {
    let client = http_client()?;
    let body = client
        .get(EQUITY_LIST_URL)
        .header("cache-control", "no-cache")
        .send()?
        .error_for_status()?
        .text()?;
    SymbolTable::from_reader(body.as_bytes()).context("Downloaded symbol list is not usable")?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(target, &body).with_context(|| format!("Write {}", target.display()))?;
    Ok(body.len())
}
