use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
pub struct TableRate {
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Mid")]
    pub mid: String,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct TableRates {
    #[serde(rename = "Rate", default)]
    pub rate: Vec<TableRate>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ExchangeRatesTable {
    #[serde(rename = "Table")]
    pub table: String,
    #[serde(rename = "No")]
    pub no: String,
    #[serde(rename = "EffectiveDate")]
    pub effective_date: String,
    #[serde(rename = "Rates", default)]
    pub rates: TableRates,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ArrayOfExchangeRatesTable {
    #[serde(rename = "ExchangeRatesTable", default)]
    pub tables: Vec<ExchangeRatesTable>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct SeriesRate {
    #[serde(rename = "No")]
    pub no: String,
    #[serde(rename = "EffectiveDate")]
    pub effective_date: String,
    #[serde(rename = "Mid")]
    pub mid: String,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct SeriesRates {
    #[serde(rename = "Rate", default)]
    pub rate: Vec<SeriesRate>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ExchangeRatesSeries {
    #[serde(rename = "Table")]
    pub table: String,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Rates", default)]
    pub rates: SeriesRates,
}
