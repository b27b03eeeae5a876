//! Wave client: GraphQL for reads and mutations, REST for payments.
//!
//! Wave's public GraphQL API has no mutation for recording an invoice
//! payment, so payments go through the REST API. That API addresses
//! businesses and invoices by their legacy ids, which are embedded in the
//! base64 GraphQL ids (`Invoice:<id>;Business:<id>`).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{endpoint, http_client, send_json};
use crate::dates::ISO_DATE_FORMAT;
use crate::error::{LongboardError, Result};
use crate::models::{
    Account, Business, BusinessId, Customer, CustomerCreateInput, CustomerId, CustomerPatchInput,
    Invoice, InvoiceCreateInput, InvoiceId, InvoiceItem, InvoiceQuery, MutationOutcome, NaiveDate,
    Payment, PaymentId, PaymentInput, Product, ProductId,
};
use crate::platform::DestinationPlatform;

/// Base URL for the Wave GraphQL API.
const DEFAULT_BASE_URL: &str = "https://gql.waveapps.com";

/// Base URL for the Wave REST API.
const DEFAULT_REST_URL: &str = "https://api.waveapps.com";

/// GraphQL endpoint path.
const GRAPHQL_PATH: &str = "/graphql/public";

/// Page size used for list queries.
const PAGE_SIZE: u32 = 99;

/// Type tag of business ids.
const ID_BUSINESS: &str = "Business";

/// Type tag of invoice ids.
const ID_INVOICE: &str = "Invoice";

/// Business lookup.
const BUSINESS_QUERY: &str = "query Business($businessId: ID!) {
  business(id: $businessId) { id name currency { code } }
}";

/// Customer list, one page.
const CUSTOMERS_QUERY: &str = "query Customers($businessId: ID!, $page: Int!, $pageSize: Int!) {
  business(id: $businessId) {
    page: customers(page: $page, pageSize: $pageSize) {
      pageInfo { currentPage totalPages }
      edges { node { id name displayId firstName lastName internalNotes } }
    }
  }
}";

/// Customer creation.
const CUSTOMER_CREATE_MUTATION: &str = "mutation CustomerCreate($input: CustomerCreateInput!) {
  outcome: customerCreate(input: $input) {
    didSucceed
    inputErrors { code message path }
    entity: customer { id name displayId firstName lastName internalNotes }
  }
}";

/// Customer patch.
const CUSTOMER_PATCH_MUTATION: &str = "mutation CustomerPatch($input: CustomerPatchInput!) {
  outcome: customerPatch(input: $input) {
    didSucceed
    inputErrors { code message path }
    entity: customer { id name displayId firstName lastName internalNotes }
  }
}";

/// Field selection shared by invoice queries.
const INVOICE_FIELDS: &str = "id invoiceNumber title status invoiceDate dueDate memo
  currency { code }
  customer { id }
  items { product { id } description quantity unitPrice }";

/// Account list, one page.
const ACCOUNTS_QUERY: &str = "query Accounts($businessId: ID!, $page: Int!, $pageSize: Int!) {
  business(id: $businessId) {
    page: accounts(page: $page, pageSize: $pageSize) {
      pageInfo { currentPage totalPages }
      edges { node { id name classicId } }
    }
  }
}";

/// Product list, one page.
const PRODUCTS_QUERY: &str = "query Products($businessId: ID!, $page: Int!, $pageSize: Int!) {
  business(id: $businessId) {
    page: products(page: $page, pageSize: $pageSize) {
      pageInfo { currentPage totalPages }
      edges { node { id name } }
    }
  }
}";

/// Single product lookup.
const PRODUCT_QUERY: &str = "query Product($businessId: ID!, $productId: ID!) {
  business(id: $businessId) { entity: product(id: $productId) { id name } }
}";

/// Invoice list query; built at runtime to share the field selection.
fn invoices_query() -> String {
    format!(
        "query Invoices($businessId: ID!, $page: Int!, $pageSize: Int!, \
         $invoiceNumber: String, $invoiceDateStart: Date, $invoiceDateEnd: Date) {{
  business(id: $businessId) {{
    page: invoices(page: $page, pageSize: $pageSize, invoiceNumber: $invoiceNumber,
                   invoiceDateStart: $invoiceDateStart, invoiceDateEnd: $invoiceDateEnd) {{
      pageInfo {{ currentPage totalPages }}
      edges {{ node {{ {INVOICE_FIELDS} }} }}
    }}
  }}
}}"
    )
}

/// Single invoice query.
fn invoice_query() -> String {
    format!(
        "query Invoice($businessId: ID!, $invoiceId: ID!) {{
  business(id: $businessId) {{ entity: invoice(id: $invoiceId) {{ {INVOICE_FIELDS} }} }}
}}"
    )
}

/// Invoice creation mutation.
fn invoice_create_mutation() -> String {
    format!(
        "mutation InvoiceCreate($input: InvoiceCreateInput!) {{
  outcome: invoiceCreate(input: $input) {{
    didSucceed
    inputErrors {{ code message path }}
    entity: invoice {{ {INVOICE_FIELDS} }}
  }}
}}"
    )
}

/// Encodes a Wave global id, optionally scoped to a business.
#[must_use]
pub fn encode_global_id(kind: &str, id: &str, business: Option<&str>) -> String {
    let raw = business.map_or_else(
        || format!("{kind}:{id}"),
        |business_id| format!("{kind}:{id};{ID_BUSINESS}:{business_id}"),
    );
    STANDARD.encode(raw)
}

/// Decodes a Wave global id into its `(type, id)` pairs.
///
/// # Errors
///
/// Returns [`LongboardError::Record`] if the id is not base64 or not of
/// the form `Type:id[;Type:id...]`.
pub fn decode_global_id(global_id: &str) -> Result<Vec<(String, String)>> {
    let bytes = STANDARD
        .decode(global_id.trim())
        .map_err(|err| LongboardError::record("id", format!("`{global_id}`: {err}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|err| LongboardError::record("id", format!("`{global_id}`: {err}")))?;
    text.split(';')
        .map(|part| {
            part.split_once(':')
                .map(|(kind, id)| (kind.to_owned(), id.to_owned()))
                .ok_or_else(|| LongboardError::record("id", format!("malformed id part `{part}`")))
        })
        .collect()
}

/// Finds the id tagged `kind` in a decoded global id.
fn id_part<'ids>(parts: &'ids [(String, String)], kind: &'static str) -> Result<&'ids str> {
    parts
        .iter()
        .find(|part| part.0 == kind)
        .map(|part| part.1.as_str())
        .ok_or_else(|| LongboardError::record("id", format!("no {kind} part")))
}

// ── Wire shapes ─────────────────────────────────────────────────────────

/// GraphQL request body.
#[derive(Debug, Serialize)]
struct GraphQlRequest<'req, Vars: Serialize> {
    /// Query or mutation document.
    query: &'req str,
    /// Operation variables.
    variables: &'req Vars,
}

/// GraphQL response body.
#[derive(Debug, Deserialize)]
struct GraphQlResponse<Data> {
    /// Result data, absent on hard errors.
    data: Option<Data>,
    /// Reported errors.
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// One GraphQL error.
#[derive(Debug, Deserialize)]
struct GraphQlError {
    /// Error message.
    message: String,
}

/// `{ business { ... } }` wrapper.
#[derive(Debug, Deserialize)]
struct BusinessData<Inner> {
    /// The business, if it exists.
    business: Option<Inner>,
}

/// `{ outcome { ... } }` wrapper of mutations.
#[derive(Debug, Deserialize)]
struct OutcomeData<Entity> {
    /// Mutation result.
    outcome: MutationOutcome<Entity>,
}

/// `{ entity { ... } }` wrapper of single-entity lookups.
#[derive(Debug, Deserialize)]
struct EntityData<Entity> {
    /// The entity, if found.
    entity: Option<Entity>,
}

/// `{ page { ... } }` wrapper of list queries.
#[derive(Debug, Deserialize)]
struct PageData<Node> {
    /// One page of the connection.
    page: Connection<Node>,
}

/// A paginated GraphQL connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<Node> {
    /// Pagination state.
    page_info: PageInfo,
    /// Items on this page.
    edges: Vec<Edge<Node>>,
}

/// Connection pagination state.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    /// Page returned.
    current_page: u32,
    /// Total number of pages.
    total_pages: u32,
}

/// Connection edge.
#[derive(Debug, Deserialize)]
struct Edge<Node> {
    /// The item.
    node: Node,
}

/// Business node.
#[derive(Debug, Deserialize)]
struct BusinessNode {
    /// Global id.
    id: BusinessId,
    /// Display name.
    name: String,
    /// Default currency.
    currency: Option<CurrencyNode>,
}

/// Currency node.
#[derive(Debug, Deserialize)]
struct CurrencyNode {
    /// ISO code.
    code: String,
}

/// `{ id }` reference node.
#[derive(Debug, Deserialize)]
struct IdNode<Id> {
    /// Referenced id.
    id: Id,
}

/// Invoice node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceNode {
    /// Global id.
    id: InvoiceId,
    /// Invoice number.
    invoice_number: String,
    /// Title.
    title: Option<String>,
    /// Status.
    status: String,
    /// Issue date.
    invoice_date: NaiveDate,
    /// Due date.
    due_date: Option<NaiveDate>,
    /// Memo.
    memo: Option<String>,
    /// Currency.
    currency: CurrencyNode,
    /// Billed customer.
    customer: IdNode<CustomerId>,
    /// Line items.
    #[serde(default)]
    items: Vec<InvoiceItemNode>,
}

/// Invoice line item node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceItemNode {
    /// Product billed.
    product: IdNode<ProductId>,
    /// Line description.
    description: Option<String>,
    /// Decimal quantity, as a string or number.
    quantity: Value,
    /// Decimal unit price, as a string or number.
    unit_price: Value,
}

/// Reads a Wave decimal scalar.
fn decimal(value: &Value, field: &'static str) -> Result<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        .ok_or_else(|| LongboardError::record(field, format!("not a decimal: {value}")))
}

impl TryFrom<InvoiceNode> for Invoice {
    type Error = LongboardError;

    fn try_from(node: InvoiceNode) -> Result<Self> {
        let items = node
            .items
            .into_iter()
            .map(|item| {
                Ok(InvoiceItem {
                    product_id: item.product.id,
                    description: item.description,
                    quantity: decimal(&item.quantity, "quantity")?,
                    unit_price: decimal(&item.unit_price, "unitPrice")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: node.id,
            invoice_number: node.invoice_number,
            customer_id: node.customer.id,
            title: node.title,
            currency: node.currency.code,
            status: node.status,
            invoice_date: node.invoice_date,
            due_date: node.due_date,
            items,
            memo: node.memo,
        })
    }
}

/// Body of the REST payment call.
#[derive(Debug, Serialize)]
struct PaymentRequest<'req> {
    /// Amount paid.
    amount: f64,
    /// Always 1; invoices are in the business currency.
    exchange_rate: u32,
    /// Memo.
    memo: Option<&'req str>,
    /// Deposit account by legacy id.
    payment_account: PaymentAccount<'req>,
    /// Date paid, `yyyy-MM-dd`.
    payment_date: String,
    /// Payment method.
    payment_method: &'static str,
}

/// Deposit account reference of [`PaymentRequest`].
#[derive(Debug, Serialize)]
struct PaymentAccount<'req> {
    /// Legacy account id.
    id: &'req str,
}

// ── Client ──────────────────────────────────────────────────────────────

/// Builder for constructing a [`WaveClient`].
#[derive(Debug)]
pub struct WaveClientBuilder {
    /// Access token for API authentication.
    token: Option<SecretString>,
    /// GraphQL base URL override (for testing).
    base_url: Option<String>,
    /// REST base URL override (for testing).
    rest_url: Option<String>,
}

impl WaveClientBuilder {
    /// Sets the access token for API authentication.
    #[inline]
    #[must_use]
    pub fn token<T: Into<String>>(mut self, token: T) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Overrides the GraphQL base URL (useful for testing with a mock server).
    #[inline]
    #[must_use]
    pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Overrides the REST base URL used for payments.
    #[inline]
    #[must_use]
    pub fn rest_url<T: Into<String>>(mut self, url: T) -> Self {
        self.rest_url = Some(url.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Config`] if no token was provided.
    /// Returns [`LongboardError::Http`] if the HTTP client fails to build.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub fn build(self) -> Result<WaveClient> {
        let token = self
            .token
            .ok_or_else(|| LongboardError::Config("Wave token is required".to_owned()))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let rest_url = self
            .rest_url
            .unwrap_or_else(|| DEFAULT_REST_URL.to_owned());
        tracing::debug!(base_url = %base_url, rest_url = %rest_url, "building Wave client");
        Ok(WaveClient {
            http: http_client()?,
            token,
            base_url,
            rest_url,
        })
    }
}

/// Blocking client for the Wave API.
///
/// Use [`WaveClient::builder()`] to construct an instance.
#[derive(Debug)]
pub struct WaveClient {
    /// Underlying HTTP client.
    http: Client,
    /// Bearer access token.
    token: SecretString,
    /// GraphQL base URL.
    base_url: String,
    /// REST base URL.
    rest_url: String,
}

impl WaveClient {
    /// Creates a new builder for configuring the client.
    #[inline]
    #[must_use]
    pub const fn builder() -> WaveClientBuilder {
        WaveClientBuilder {
            token: None,
            base_url: None,
            rest_url: None,
        }
    }

    /// Runs a GraphQL operation and returns its data.
    #[tracing::instrument(skip_all)]
    fn graphql<Vars: Serialize, Data: DeserializeOwned>(
        &self,
        query: &str,
        variables: &Vars,
    ) -> Result<Data> {
        let url = endpoint(&self.base_url, GRAPHQL_PATH, &[])?;
        let request = self.http.post(url).json(&GraphQlRequest { query, variables });
        let response: GraphQlResponse<Data> = send_json(request, &self.token)?;
        if !response.errors.is_empty() {
            let message = response
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            tracing::debug!(message = %message, "GraphQL errors");
            return Err(LongboardError::GraphQl(message));
        }
        response
            .data
            .ok_or_else(|| LongboardError::GraphQl("response carried no data".to_owned()))
    }

    /// Collects every page of a business-scoped list query.
    fn paginate<Node: DeserializeOwned>(
        &self,
        query: &str,
        business_id: &BusinessId,
        extra: &Value,
    ) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut page = 1_u32;
        loop {
            let mut variables = json!({
                "businessId": business_id,
                "page": page,
                "pageSize": PAGE_SIZE,
            });
            if let (Some(target), Some(source)) = (variables.as_object_mut(), extra.as_object()) {
                target.extend(source.clone());
            }
            let data: BusinessData<PageData<Node>> = self.graphql(query, &variables)?;
            let Some(business) = data.business else {
                return Err(LongboardError::BusinessNotFound(business_id.clone()));
            };
            let connection = business.page;
            nodes.extend(connection.edges.into_iter().map(|edge| edge.node));
            if connection.page_info.current_page >= connection.page_info.total_pages {
                break;
            }
            page = connection.page_info.current_page + 1;
        }
        tracing::debug!(count = nodes.len(), "fetched all pages");
        Ok(nodes)
    }

    /// Runs a mutation wrapped as `outcome`.
    fn mutate<Input: Serialize, Entity: DeserializeOwned>(
        &self,
        mutation: &str,
        input: &Input,
    ) -> Result<MutationOutcome<Entity>> {
        let data: OutcomeData<Entity> = self.graphql(mutation, &json!({ "input": input }))?;
        Ok(data.outcome)
    }
}

impl DestinationPlatform for WaveClient {
    #[tracing::instrument(skip_all, fields(business = %id))]
    fn business(&self, id: &BusinessId) -> Result<Option<Business>> {
        let data: BusinessData<BusinessNode> =
            self.graphql(BUSINESS_QUERY, &json!({ "businessId": id }))?;
        Ok(data.business.map(|node| Business {
            id: node.id,
            name: node.name,
            currency: node.currency.map(|currency| currency.code),
        }))
    }

    #[tracing::instrument(skip_all)]
    fn customers(&self, business_id: &BusinessId) -> Result<Vec<Customer>> {
        self.paginate(CUSTOMERS_QUERY, business_id, &Value::Null)
    }

    #[tracing::instrument(skip_all)]
    fn create_customer(&self, input: &CustomerCreateInput) -> Result<MutationOutcome<Customer>> {
        self.mutate(CUSTOMER_CREATE_MUTATION, input)
    }

    #[tracing::instrument(skip_all, fields(customer = %input.id))]
    fn patch_customer(&self, input: &CustomerPatchInput) -> Result<MutationOutcome<Customer>> {
        self.mutate(CUSTOMER_PATCH_MUTATION, input)
    }

    #[tracing::instrument(skip_all)]
    fn invoices(&self, business_id: &BusinessId, query: &InvoiceQuery) -> Result<Vec<Invoice>> {
        let filter = json!({
            "invoiceNumber": query.invoice_number,
            "invoiceDateStart": query.from.map(|date| date.format(ISO_DATE_FORMAT).to_string()),
            "invoiceDateEnd": query.to.map(|date| date.format(ISO_DATE_FORMAT).to_string()),
        });
        let nodes: Vec<InvoiceNode> = self.paginate(&invoices_query(), business_id, &filter)?;
        nodes.into_iter().map(Invoice::try_from).collect()
    }

    #[tracing::instrument(skip_all, fields(invoice = %invoice_id))]
    fn invoice(
        &self,
        business_id: &BusinessId,
        invoice_id: &InvoiceId,
    ) -> Result<Option<Invoice>> {
        let data: BusinessData<EntityData<InvoiceNode>> = self.graphql(
            &invoice_query(),
            &json!({ "businessId": business_id, "invoiceId": invoice_id }),
        )?;
        data.business
            .and_then(|business| business.entity)
            .map(Invoice::try_from)
            .transpose()
    }

    #[tracing::instrument(skip_all, fields(invoice_number = %input.invoice_number))]
    fn create_invoice(&self, input: &InvoiceCreateInput) -> Result<MutationOutcome<Invoice>> {
        let outcome: MutationOutcome<InvoiceNode> =
            self.mutate(&invoice_create_mutation(), input)?;
        Ok(MutationOutcome {
            did_succeed: outcome.did_succeed,
            input_errors: outcome.input_errors,
            entity: outcome.entity.map(Invoice::try_from).transpose()?,
        })
    }

    #[tracing::instrument(skip_all)]
    fn accounts(&self, business_id: &BusinessId) -> Result<Vec<Account>> {
        self.paginate(ACCOUNTS_QUERY, business_id, &Value::Null)
    }

    #[tracing::instrument(skip_all)]
    fn products(&self, business_id: &BusinessId) -> Result<Vec<Product>> {
        self.paginate(PRODUCTS_QUERY, business_id, &Value::Null)
    }

    #[tracing::instrument(skip_all, fields(product = %product_id))]
    fn product(
        &self,
        business_id: &BusinessId,
        product_id: &ProductId,
    ) -> Result<Option<Product>> {
        let data: BusinessData<EntityData<Product>> = self.graphql(
            PRODUCT_QUERY,
            &json!({ "businessId": business_id, "productId": product_id }),
        )?;
        Ok(data.business.and_then(|business| business.entity))
    }

    #[tracing::instrument(skip_all, fields(invoice = %input.invoice_id))]
    fn create_payment(&self, input: &PaymentInput) -> Result<Payment> {
        let parts = decode_global_id(input.invoice_id.as_inner())?;
        let business = id_part(&parts, ID_BUSINESS)?;
        let invoice = id_part(&parts, ID_INVOICE)?;
        let classic_id = input.account.classic_id.as_deref().ok_or_else(|| {
            LongboardError::Config(format!("account {} has no classic id", input.account.id))
        })?;
        let url = endpoint(
            &self.rest_url,
            &format!("/businesses/{business}/invoices/{invoice}/payments/"),
            &[],
        )?;
        let body = PaymentRequest {
            amount: input.amount,
            exchange_rate: 1,
            memo: input.memo.as_deref(),
            payment_account: PaymentAccount { id: classic_id },
            payment_date: input.payment_date.format(ISO_DATE_FORMAT).to_string(),
            payment_method: input.method.as_str(),
        };
        tracing::debug!(path = url.path(), "recording payment");
        let created: Value = send_json(self.http.post(url).json(&body), &self.token)?;
        let id = created
            .get("id")
            .filter(|id| id.is_string() || id.is_number())
            .map(|id| id.as_str().map_or_else(|| id.to_string(), ToOwned::to_owned))
            .ok_or_else(|| LongboardError::record("id", "payment response has no id"))?;
        Ok(Payment {
            id: PaymentId::new(id),
        })
    }
}
