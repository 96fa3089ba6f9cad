use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use shade_models::{
    EncryptionKey, Erc20Amount, Erc20AmountRecipient, EvmGasType, FeeTokenDetails, NetworkName,
    NftAmountRecipient, NftTokenType, RailgunPopulateTransactionResponse,
    RailgunTransactionGasEstimateResponse, TransactionGasDetails, TxidVersion,
    UnshieldToOriginRecipients, U256,
};
use shade_worker::{
    unshield_registry, BridgeCall, BridgeClient, BridgeError,
    GasEstimateForUnprovenUnshieldBaseTokenParams, GasEstimateForUnprovenUnshieldParams,
    GasEstimateForUnprovenUnshieldToOriginParams,
    GetErc20AndNftAmountRecipientsForUnshieldToOriginParams,
    PopulateProvedUnshieldBaseTokenParams, PopulateProvedUnshieldParams,
    PopulateProvedUnshieldToOriginParams, SdkError, SdkReply, UnshieldSdk,
};

type Recorded = (String, Vec<Value>);

struct RecordingSdk {
    reply: Result<Value, SdkError>,
    calls: Mutex<Vec<Recorded>>,
    finished: Mutex<Vec<String>>,
}

impl RecordingSdk {
    fn replying(reply: Result<Value, SdkError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        })
    }

    fn record<T>(&self, function: &str, args: Vec<Value>) -> Result<SdkReply<T>, SdkError> {
        self.calls.lock().unwrap().push((function.to_string(), args));
        self.reply.clone().map(SdkReply::new)
    }

    fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UnshieldSdk for RecordingSdk {
    async fn populate_proved_unshield(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
        broadcaster_fee_erc20_amount_recipient: Option<Erc20AmountRecipient>,
        send_with_public_wallet: bool,
        overall_batch_min_gas_price: Option<U256>,
        transaction_gas_details: TransactionGasDetails,
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError> {
        self.record(
            "populateProvedUnshield",
            vec![
                json!(txid_version),
                json!(network_name),
                json!(railgun_wallet_id),
                json!(erc20_amount_recipients),
                json!(nft_amount_recipients),
                json!(broadcaster_fee_erc20_amount_recipient),
                json!(send_with_public_wallet),
                json!(overall_batch_min_gas_price),
                json!(transaction_gas_details),
            ],
        )
    }

    async fn populate_proved_unshield_base_token(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        public_wallet_address: String,
        railgun_wallet_id: String,
        wrapped_token_amount: Erc20Amount,
        broadcaster_fee_erc20_amount_recipient: Option<Erc20AmountRecipient>,
        send_with_public_wallet: bool,
        overall_batch_min_gas_price: Option<U256>,
        transaction_gas_details: TransactionGasDetails,
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError> {
        self.record(
            "populateProvedUnshieldBaseToken",
            vec![
                json!(txid_version),
                json!(network_name),
                json!(public_wallet_address),
                json!(railgun_wallet_id),
                json!(wrapped_token_amount),
                json!(broadcaster_fee_erc20_amount_recipient),
                json!(send_with_public_wallet),
                json!(overall_batch_min_gas_price),
                json!(transaction_gas_details),
            ],
        )
    }

    async fn populate_proved_unshield_to_origin(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
        transaction_gas_details: TransactionGasDetails,
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError> {
        self.record(
            "populateProvedUnshieldToOrigin",
            vec![
                json!(txid_version),
                json!(network_name),
                json!(railgun_wallet_id),
                json!(erc20_amount_recipients),
                json!(nft_amount_recipients),
                json!(transaction_gas_details),
            ],
        )
    }

    async fn gas_estimate_for_unproven_unshield(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        encryption_key: EncryptionKey,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
        original_gas_details: TransactionGasDetails,
        fee_token_details: Option<FeeTokenDetails>,
        send_with_public_wallet: bool,
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError> {
        self.record(
            "gasEstimateForUnprovenUnshield",
            vec![
                json!(txid_version),
                json!(network_name),
                json!(railgun_wallet_id),
                json!(encryption_key),
                json!(erc20_amount_recipients),
                json!(nft_amount_recipients),
                json!(original_gas_details),
                json!(fee_token_details),
                json!(send_with_public_wallet),
            ],
        )
    }

    async fn gas_estimate_for_unproven_unshield_base_token(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        public_wallet_address: String,
        railgun_wallet_id: String,
        encryption_key: EncryptionKey,
        wrapped_token_amount: Erc20Amount,
        original_gas_details: TransactionGasDetails,
        fee_token_details: Option<FeeTokenDetails>,
        send_with_public_wallet: bool,
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError> {
        self.record(
            "gasEstimateForUnprovenUnshieldBaseToken",
            vec![
                json!(txid_version),
                json!(network_name),
                json!(public_wallet_address),
                json!(railgun_wallet_id),
                json!(encryption_key),
                json!(wrapped_token_amount),
                json!(original_gas_details),
                json!(fee_token_details),
                json!(send_with_public_wallet),
            ],
        )
    }

    async fn gas_estimate_for_unproven_unshield_to_origin(
        &self,
        original_shield_txid: String,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        encryption_key: EncryptionKey,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError> {
        self.record(
            "gasEstimateForUnprovenUnshieldToOrigin",
            vec![
                json!(original_shield_txid),
                json!(txid_version),
                json!(network_name),
                json!(railgun_wallet_id),
                json!(encryption_key),
                json!(erc20_amount_recipients),
                json!(nft_amount_recipients),
            ],
        )
    }

    async fn get_erc20_and_nft_amount_recipients_for_unshield_to_origin(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        original_shield_txid: String,
    ) -> Result<SdkReply<UnshieldToOriginRecipients>, SdkError> {
        if original_shield_txid == "slow" {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.finished
            .lock()
            .unwrap()
            .push(original_shield_txid.clone());
        self.record(
            "getERC20AndNFTAmountRecipientsForUnshieldToOrigin",
            vec![
                json!(txid_version),
                json!(network_name),
                json!(railgun_wallet_id),
                json!(original_shield_txid),
            ],
        )
    }
}

fn recipient() -> Erc20AmountRecipient {
    Erc20AmountRecipient {
        token_address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
        amount: U256::from(1_000_000u64),
        recipient_address: "0x00000000000000000000000000000000000000aa".to_string(),
    }
}

fn nft() -> NftAmountRecipient {
    NftAmountRecipient {
        nft_address: "0x00000000000000000000000000000000000000bb".to_string(),
        nft_token_type: NftTokenType::Erc721,
        token_sub_id: "0x01".to_string(),
        amount: U256::one(),
        recipient_address: "0x00000000000000000000000000000000000000aa".to_string(),
    }
}

fn gas() -> TransactionGasDetails {
    TransactionGasDetails {
        evm_gas_type: EvmGasType::Type2,
        gas_estimate: U256::from(21_000u64),
        gas_price: None,
        max_fee_per_gas: Some(U256::from(30_000_000_000u64)),
        max_priority_fee_per_gas: Some(U256::from(1_000_000_000u64)),
    }
}

fn wrapped() -> Erc20Amount {
    Erc20Amount {
        token_address: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
        amount: U256::from(5u64),
    }
}

fn fee_token() -> FeeTokenDetails {
    FeeTokenDetails {
        token_address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
        fee_per_unit_gas: U256::from(7u64),
    }
}

fn populate_reply() -> Value {
    json!({
        "nullifiers": ["0x01", "0x02"],
        "transaction": {"to": "0xdead", "data": "0x1234", "type": 2, "chainId": 1},
        "preTransactionPOIsPerTxidLeafPerList": {"list": {}},
        "sdkVersion": "9.1.0",
    })
}

fn estimate_reply() -> Value {
    json!({"gasEstimate": "0x5208", "relayerFeeSnapshot": [1, 2, 3]})
}

#[tokio::test]
async fn populate_calls_forward_in_sdk_argument_order() {
    let sdk = RecordingSdk::replying(Ok(populate_reply()));
    let client = BridgeClient::in_process(Arc::new(unshield_registry(sdk.clone())));

    let erc20 = PopulateProvedUnshieldParams {
        txid_version: TxidVersion::V2PoseidonMerkle,
        network_name: NetworkName::Ethereum,
        rail_wallet_id: "wallet-1".to_string(),
        erc20_amount_recipients: vec![recipient()],
        nft_amount_recipients: vec![nft()],
        broadcaster_fee_erc20_amount_recipient: Some(recipient()),
        send_with_public_wallet: false,
        overall_batch_min_gas_price: Some(U256::from(9u64)),
        transaction_gas_details: gas(),
    };
    let value = client.call_raw(erc20.into()).await.unwrap();
    assert_eq!(value, populate_reply());

    let base = PopulateProvedUnshieldBaseTokenParams {
        txid_version: TxidVersion::V2PoseidonMerkle,
        network_name: NetworkName::Polygon,
        public_wallet_address: "0x00000000000000000000000000000000000000cc".to_string(),
        rail_wallet_id: "wallet-1".to_string(),
        wrapped_token_amount: wrapped(),
        broadcaster_fee_erc20_amount_recipient: None,
        send_with_public_wallet: true,
        overall_batch_min_gas_price: None,
        transaction_gas_details: gas(),
    };
    let typed = client.call(base).await.unwrap();
    assert_eq!(typed.nullifiers, Some(vec!["0x01".to_string(), "0x02".to_string()]));
    assert_eq!(serde_json::to_value(&typed).unwrap(), populate_reply());

    let origin = PopulateProvedUnshieldToOriginParams {
        txid_version: TxidVersion::V2PoseidonMerkle,
        network_name: NetworkName::Arbitrum,
        rail_wallet_id: "wallet-1".to_string(),
        erc20_amount_recipients: vec![recipient()],
        nft_amount_recipients: Vec::new(),
        transaction_gas_details: gas(),
    };
    client.call(origin).await.unwrap();

    let calls = sdk.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        (
            "populateProvedUnshield".to_string(),
            vec![
                json!("V2_PoseidonMerkle"),
                json!("Ethereum"),
                json!("wallet-1"),
                json!([recipient()]),
                json!([nft()]),
                json!(recipient()),
                json!(false),
                json!("0x9"),
                json!(gas()),
            ]
        )
    );
    assert_eq!(
        calls[1],
        (
            "populateProvedUnshieldBaseToken".to_string(),
            vec![
                json!("V2_PoseidonMerkle"),
                json!("Polygon"),
                json!("0x00000000000000000000000000000000000000cc"),
                json!("wallet-1"),
                json!(wrapped()),
                Value::Null,
                json!(true),
                Value::Null,
                json!(gas()),
            ]
        )
    );
    assert_eq!(
        calls[2],
        (
            "populateProvedUnshieldToOrigin".to_string(),
            vec![
                json!("V2_PoseidonMerkle"),
                json!("Arbitrum"),
                json!("wallet-1"),
                json!([recipient()]),
                json!([]),
                json!(gas()),
            ]
        )
    );
}

#[tokio::test]
async fn gas_estimates_forward_in_sdk_argument_order() {
    let sdk = RecordingSdk::replying(Ok(estimate_reply()));
    let client = BridgeClient::in_process(Arc::new(unshield_registry(sdk.clone())));

    let erc20 = GasEstimateForUnprovenUnshieldParams {
        txid_version: TxidVersion::V2PoseidonMerkle,
        network_name: NetworkName::Ethereum,
        rail_wallet_id: "wallet-1".to_string(),
        encryption_key: EncryptionKey::new("k1"),
        erc20_amount_recipients: vec![recipient()],
        nft_amount_recipients: Vec::new(),
        original_gas_details: gas(),
        fee_token_details: Some(fee_token()),
        send_with_public_wallet: false,
    };
    let value = client.call_raw(erc20.into()).await.unwrap();
    assert_eq!(value, estimate_reply());

    let base = GasEstimateForUnprovenUnshieldBaseTokenParams {
        txid_version: TxidVersion::V3PoseidonMerkle,
        network_name: NetworkName::EthereumSepolia,
        public_wallet_address: "0x00000000000000000000000000000000000000cc".to_string(),
        rail_wallet_id: "wallet-2".to_string(),
        encryption_key: EncryptionKey::new("k2"),
        wrapped_token_amount: wrapped(),
        original_gas_details: gas(),
        fee_token_details: None,
        send_with_public_wallet: true,
    };
    let typed = client.call(base).await.unwrap();
    assert_eq!(typed.gas_estimate, U256::from(0x5208u64));
    assert_eq!(typed.extra.get("relayerFeeSnapshot"), Some(&json!([1, 2, 3])));

    let origin = GasEstimateForUnprovenUnshieldToOriginParams {
        original_shield_txid: "0xshield".to_string(),
        txid_version: TxidVersion::V2PoseidonMerkle,
        network_name: NetworkName::BnbChain,
        rail_wallet_id: "wallet-3".to_string(),
        encryption_key: EncryptionKey::new("k3"),
        erc20_amount_recipients: vec![recipient()],
        nft_amount_recipients: vec![nft()],
    };
    client.call(origin).await.unwrap();

    let calls = sdk.calls();
    assert_eq!(
        calls[0],
        (
            "gasEstimateForUnprovenUnshield".to_string(),
            vec![
                json!("V2_PoseidonMerkle"),
                json!("Ethereum"),
                json!("wallet-1"),
                json!("k1"),
                json!([recipient()]),
                json!([]),
                json!(gas()),
                json!(fee_token()),
                json!(false),
            ]
        )
    );
    assert_eq!(
        calls[1],
        (
            "gasEstimateForUnprovenUnshieldBaseToken".to_string(),
            vec![
                json!("V3_PoseidonMerkle"),
                json!("Ethereum_Sepolia"),
                json!("0x00000000000000000000000000000000000000cc"),
                json!("wallet-2"),
                json!("k2"),
                json!(wrapped()),
                json!(gas()),
                Value::Null,
                json!(true),
            ]
        )
    );
    assert_eq!(
        calls[2],
        (
            "gasEstimateForUnprovenUnshieldToOrigin".to_string(),
            vec![
                json!("0xshield"),
                json!("V2_PoseidonMerkle"),
                json!("BNB_Chain"),
                json!("wallet-3"),
                json!("k3"),
                json!([recipient()]),
                json!([nft()]),
            ]
        )
    );
}

#[tokio::test]
async fn sdk_results_are_relayed_byte_for_byte() {
    // Explicit nulls and a zero-padded quantity, as a JS SDK may produce them.
    let reply = json!({
        "nullifiers": null,
        "preTransactionPOIsPerTxidLeafPerList": null,
        "transaction": {"to": "0xdead", "data": "0x", "value": "0x00", "gasLimit": null},
    });
    let sdk = RecordingSdk::replying(Ok(reply.clone()));
    let client = BridgeClient::in_process(Arc::new(unshield_registry(sdk.clone())));

    let params = PopulateProvedUnshieldToOriginParams {
        txid_version: TxidVersion::V2PoseidonMerkle,
        network_name: NetworkName::Ethereum,
        rail_wallet_id: "wallet-1".to_string(),
        erc20_amount_recipients: vec![recipient()],
        nft_amount_recipients: Vec::new(),
        transaction_gas_details: gas(),
    };
    let relayed = client.call_raw(params.clone().into()).await.unwrap();
    assert_eq!(relayed, reply);
    assert_eq!(relayed.to_string(), reply.to_string());

    let typed = client.call(params).await.unwrap();
    assert_eq!(typed.nullifiers, None);
    assert_eq!(typed.transaction.value, Some(U256::zero()));
    assert_eq!(sdk.calls().len(), 2);
}

#[tokio::test]
async fn sdk_errors_reach_the_caller_unchanged() {
    let failure = SdkError::with_code("Failed to unshield: insufficient balance", -32603);
    let sdk = RecordingSdk::replying(Err(failure.clone()));
    let client = BridgeClient::in_process(Arc::new(unshield_registry(sdk.clone())));

    let params = GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
        txid_version: TxidVersion::V2PoseidonMerkle,
        network_name: NetworkName::Polygon,
        railgun_wallet_id: "wallet-1".to_string(),
        original_shield_txid: "0xshield".to_string(),
    };
    match client.call(params).await {
        Err(BridgeError::Sdk(err)) => assert_eq!(err, failure),
        other => panic!("expected sdk error, got {other:?}"),
    }
    assert_eq!(sdk.calls().len(), 1);
}

#[tokio::test]
async fn concurrent_calls_complete_independently() {
    let reply = json!({"erc20AmountRecipients": [], "nftAmountRecipients": []});
    let sdk = RecordingSdk::replying(Ok(reply));
    let client = BridgeClient::in_process(Arc::new(unshield_registry(sdk.clone())));

    let call = |txid: &str| -> BridgeCall {
        GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
            txid_version: TxidVersion::V2PoseidonMerkle,
            network_name: NetworkName::Ethereum,
            railgun_wallet_id: "wallet-1".to_string(),
            original_shield_txid: txid.to_string(),
        }
        .into()
    };
    let (slow, fast) = tokio::join!(client.call_raw(call("slow")), client.call_raw(call("fast")));
    slow.unwrap();
    fast.unwrap();
    assert_eq!(
        sdk.finished.lock().unwrap().clone(),
        vec!["fast".to_string(), "slow".to_string()]
    );
}
