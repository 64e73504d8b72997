// Response fields are aliased to the snake_case names the domain types use.

pub const REGISTER_MEMBER: &str = r#"
mutation RegisterMember($input: MemberRegistrationInput!) {
  registerMember(input: $input) { id }
}"#;

pub const GROUP_BALANCE: &str = r#"
query GroupBalance($accountId: String!) {
  groupBalance(accountId: $accountId)
}"#;

pub const LOAN_PRODUCT_RATE: &str = r#"
query LoanProduct {
  loanProduct { interest_rate: interestRate }
}"#;

pub const LOAN_PRODUCT_ID: &str = r#"
query LoanProductId {
  loanProduct { id }
}"#;

pub const CREATE_LOAN: &str = r#"
mutation CreateLoan($input: LoanInput!) {
  createLoan(input: $input) { id }
}"#;

pub const DEBIT_INSTALLMENT: &str = r#"
mutation DebitInstallment($loanId: String!) {
  debitInstallment(loanId: $loanId) { status }
}"#;

pub const OUTSTANDING_BILL: &str = r#"
query OutstandingBill($memberId: String!) {
  outstandingBill(memberId: $memberId) { loan_id: loanId amount due_date: dueDate }
}"#;

pub const SETTLE_BILL: &str = r#"
mutation PayPaylater($memberId: String!) {
  payPaylater(memberId: $memberId) { status }
}"#;

pub const SETTLEMENT_QUOTES: &str = r#"
query PayoffQuotes($memberId: String!) {
  payoffQuotes(memberId: $memberId) { loan_id: loanId principal interest total }
}"#;

pub const ARREARS: &str = r#"
query Arrears($accountId: String!) {
  arrears(accountId: $accountId) {
    loan_id: loanId principal interest penalty days_past_due: daysPastDue
  }
}"#;

pub const PAYLATER_LIMIT: &str = r#"
query PaylaterLimit($memberId: String!) {
  paylaterLimit(memberId: $memberId) { max_limit: maxLimit used available }
}"#;

pub const ACCOUNT_BALANCE: &str = r#"
query AccountBalance($account: String!) {
  accountBalance(account: $account) { account balance available }
}"#;

pub const MUTATIONS: &str = r#"
query Mutations($accountId: String!, $startDate: String!, $endDate: String!) {
  mutations(accountId: $accountId, startDate: $startDate, endDate: $endDate) {
    posted_at: postedAt description debit credit balance
  }
}"#;
