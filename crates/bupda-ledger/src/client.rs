use std::time::Duration;

use async_trait::async_trait;
use bupda_core::{
    AccountBalance, Arrear, BillItem, LedgerCredential, LedgerError, LedgerGateway, LoanRequest,
    MemberRegistration, Mutation, PaylaterLimit, SettlementQuote, VENDOR_ERROR_PREFIX,
};
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::documents;

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

// One request per call, nothing is retried.
#[derive(Clone)]
pub struct GraphqlLedger {
    client: Client,
    endpoint: String,
}

impl GraphqlLedger {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LedgerError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        access_token: &str,
        query: &str,
        variables: Value,
        pointer: &str,
    ) -> Result<T, LedgerError> {
        let mut request = self.client.post(&self.endpoint);
        if !access_token.is_empty() {
            request = request.bearer_auth(access_token);
        }
        let response = request
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;

        let status = response.status();
        let body: GraphqlResponse = match response.json().await {
            Ok(body) => body,
            Err(err) if status.is_success() => return Err(LedgerError::Decode(err.to_string())),
            Err(_) => return Err(LedgerError::Transport(format!("HTTP {status}"))),
        };

        debug!("ledger answered {pointer} with HTTP {status}");
        decode_response(body, pointer)
    }
}

fn decode_response<T: DeserializeOwned>(
    body: GraphqlResponse,
    pointer: &str,
) -> Result<T, LedgerError> {
    if let Some(first) = body.errors.first() {
        warn!("ledger rejected {pointer}: {}", first.message);
        return Err(LedgerError::Rejected(format!(
            "{VENDOR_ERROR_PREFIX}{}",
            first.message
        )));
    }

    let data = body
        .data
        .ok_or_else(|| LedgerError::Decode("response carried no data".to_string()))?;
    let value = data.pointer(pointer).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|err| LedgerError::Decode(format!("{pointer}: {err}")))
}

#[async_trait]
impl LedgerGateway for GraphqlLedger {
    // Registration happens before the member has a token.
    async fn activate_member(
        &self,
        registration: &MemberRegistration,
    ) -> Result<(), LedgerError> {
        let input = json!({
            "email": registration.email,
            "phone": registration.phone,
            "nik": registration.nik,
            "address": registration.address,
            "memberName": registration.member_name,
        });
        let _: Value = self
            .execute(
                "",
                documents::REGISTER_MEMBER,
                json!({ "input": input }),
                "/registerMember",
            )
            .await?;
        Ok(())
    }

    async fn group_balance(
        &self,
        access_token: &str,
        group_account: &str,
    ) -> Result<Decimal, LedgerError> {
        self.execute(
            access_token,
            documents::GROUP_BALANCE,
            json!({ "accountId": group_account }),
            "/groupBalance",
        )
        .await
    }

    async fn loan_interest_rate(&self, access_token: &str) -> Result<Decimal, LedgerError> {
        self.execute(
            access_token,
            documents::LOAN_PRODUCT_RATE,
            json!({}),
            "/loanProduct/interest_rate",
        )
        .await
    }

    async fn loan_product_id(&self, access_token: &str) -> Result<String, LedgerError> {
        let id: Option<String> = self
            .execute(
                access_token,
                documents::LOAN_PRODUCT_ID,
                json!({}),
                "/loanProduct/id",
            )
            .await?;
        Ok(id.unwrap_or_default())
    }

    async fn create_loan(
        &self,
        access_token: &str,
        request: &LoanRequest,
    ) -> Result<(), LedgerError> {
        let input = json!({
            "memberId": request.member_id,
            "accountId": request.account_id,
            "principal": request.principal,
            "totalAmount": request.total_amount,
            "isMerchant": request.is_merchant,
            "interestRate": request.interest_rate,
            "loanProductId": request.loan_product_id,
            "destinationAccount": request.destination_account,
        });
        let _: Value = self
            .execute(
                access_token,
                documents::CREATE_LOAN,
                json!({ "input": input }),
                "/createLoan",
            )
            .await?;
        Ok(())
    }

    async fn debit_installment(
        &self,
        access_token: &str,
        loan_id: &str,
    ) -> Result<(), LedgerError> {
        let _: Value = self
            .execute(
                access_token,
                documents::DEBIT_INSTALLMENT,
                json!({ "loanId": loan_id }),
                "/debitInstallment",
            )
            .await?;
        Ok(())
    }

    async fn outstanding_bill(
        &self,
        credential: &LedgerCredential,
    ) -> Result<Option<Vec<BillItem>>, LedgerError> {
        self.execute(
            &credential.access_token,
            documents::OUTSTANDING_BILL,
            json!({ "memberId": credential.member_id }),
            "/outstandingBill",
        )
        .await
    }

    async fn settle_bill(&self, credential: &LedgerCredential) -> Result<(), LedgerError> {
        let _: Value = self
            .execute(
                &credential.access_token,
                documents::SETTLE_BILL,
                json!({ "memberId": credential.member_id }),
                "/payPaylater",
            )
            .await?;
        Ok(())
    }

    async fn settlement_quotes(
        &self,
        credential: &LedgerCredential,
    ) -> Result<Vec<SettlementQuote>, LedgerError> {
        let quotes: Option<Vec<SettlementQuote>> = self
            .execute(
                &credential.access_token,
                documents::SETTLEMENT_QUOTES,
                json!({ "memberId": credential.member_id }),
                "/payoffQuotes",
            )
            .await?;
        Ok(quotes.unwrap_or_default())
    }

    async fn arrears(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Option<Vec<Arrear>>, LedgerError> {
        self.execute(
            access_token,
            documents::ARREARS,
            json!({ "accountId": account_id }),
            "/arrears",
        )
        .await
    }

    async fn paylater_limit(
        &self,
        credential: &LedgerCredential,
    ) -> Result<PaylaterLimit, LedgerError> {
        self.execute(
            &credential.access_token,
            documents::PAYLATER_LIMIT,
            json!({ "memberId": credential.member_id }),
            "/paylaterLimit",
        )
        .await
    }

    async fn account_balance(
        &self,
        access_token: &str,
        account: &str,
    ) -> Result<AccountBalance, LedgerError> {
        self.execute(
            access_token,
            documents::ACCOUNT_BALANCE,
            json!({ "account": account }),
            "/accountBalance",
        )
        .await
    }

    async fn mutations(
        &self,
        access_token: &str,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Mutation>, LedgerError> {
        let mutations: Option<Vec<Mutation>> = self
            .execute(
                access_token,
                documents::MUTATIONS,
                json!({
                    "accountId": account_id,
                    "startDate": start.format("%Y-%m-%d").to_string(),
                    "endDate": end.format("%Y-%m-%d").to_string(),
                }),
                "/mutations",
            )
            .await?;
        Ok(mutations.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: Value) -> GraphqlResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn errors_keep_the_vendor_prefix_for_the_service_layer() {
        let body = response(json!({
            "data": null,
            "errors": [{ "message": "member not found" }, { "message": "ignored" }]
        }));

        let err = decode_response::<Decimal>(body, "/groupBalance").unwrap_err();
        assert_eq!(err, LedgerError::Rejected("graphql: member not found".to_string()));
    }

    #[test]
    fn nested_fields_are_read_by_pointer() {
        let body = response(json!({ "data": { "loanProduct": { "interest_rate": "1.25" } } }));
        let rate: Decimal = decode_response(body, "/loanProduct/interest_rate").unwrap();
        assert_eq!(rate, Decimal::new(125, 2));
    }

    #[test]
    fn null_bill_means_nothing_outstanding() {
        let body = response(json!({ "data": { "outstandingBill": null } }));
        let bill: Option<Vec<BillItem>> = decode_response(body, "/outstandingBill").unwrap();
        assert!(bill.is_none());
    }

    #[test]
    fn bill_items_decode_from_aliased_fields() {
        let body = response(json!({
            "data": { "outstandingBill": [
                { "loan_id": "LN-1", "amount": 102500, "due_date": "2024-06-30" }
            ] }
        }));
        let bill: Option<Vec<BillItem>> = decode_response(body, "/outstandingBill").unwrap();
        let bill = bill.unwrap();
        assert_eq!(bill[0].amount, Decimal::new(102_500, 0));
        assert_eq!(bill[0].due_date, NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    #[test]
    fn wrong_shapes_are_decode_errors() {
        let body = response(json!({ "data": { "paylaterLimit": { "used": "x" } } }));
        let err = decode_response::<PaylaterLimit>(body, "/paylaterLimit").unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));

        let empty = response(json!({}));
        assert!(matches!(
            decode_response::<Decimal>(empty, "/groupBalance"),
            Err(LedgerError::Decode(_))
        ));
    }

    #[test]
    fn registration_rejections_carry_the_ledger_message() {
        let body = response(json!({
            "data": { "registerMember": null },
            "errors": [{ "message": "nik already registered" }]
        }));
        let err = decode_response::<Value>(body, "/registerMember").unwrap_err();
        assert_eq!(
            err,
            LedgerError::Rejected("graphql: nik already registered".to_string())
        );
    }

    #[test]
    fn endpoint_appends_graphql_path_once() {
        let ledger = GraphqlLedger::new("https://ledger.example/", Duration::from_secs(5)).unwrap();
        assert_eq!(ledger.endpoint, "https://ledger.example/graphql");
    }
}
