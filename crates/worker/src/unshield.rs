//! Handlers that forward each unshield event to the wallet SDK.
//!
//! A handler takes its params apart, calls exactly one SDK function with the
//! fields in the SDK's argument order and hands back the SDK's raw result.
//! SDK failures pass through untouched.

use std::sync::Arc;

use shade_log::log_debug;

use crate::call::{
    GasEstimateForUnprovenUnshieldBaseTokenParams, GasEstimateForUnprovenUnshieldParams,
    GasEstimateForUnprovenUnshieldToOriginParams,
    GetErc20AndNftAmountRecipientsForUnshieldToOriginParams,
    PopulateProvedUnshieldBaseTokenParams, PopulateProvedUnshieldParams,
    PopulateProvedUnshieldToOriginParams,
};
use crate::registry::BridgeRegistry;
use crate::sdk::UnshieldSdk;

pub fn register_unshield_handlers<S>(registry: &mut BridgeRegistry<S>)
where
    S: UnshieldSdk + ?Sized + 'static,
{
    registry.register(
        |sdk: Arc<S>, params: PopulateProvedUnshieldParams| async move {
            let PopulateProvedUnshieldParams {
                txid_version,
                network_name,
                rail_wallet_id,
                erc20_amount_recipients,
                nft_amount_recipients,
                broadcaster_fee_erc20_amount_recipient,
                send_with_public_wallet,
                overall_batch_min_gas_price,
                transaction_gas_details,
            } = params;
            log_debug!("populate proved unshield on {network_name}");
            sdk.populate_proved_unshield(
                txid_version,
                network_name,
                rail_wallet_id,
                erc20_amount_recipients,
                nft_amount_recipients,
                broadcaster_fee_erc20_amount_recipient,
                send_with_public_wallet,
                overall_batch_min_gas_price,
                transaction_gas_details,
            )
            .await
        },
    );

    registry.register(
        |sdk: Arc<S>, params: PopulateProvedUnshieldBaseTokenParams| async move {
            let PopulateProvedUnshieldBaseTokenParams {
                txid_version,
                network_name,
                public_wallet_address,
                rail_wallet_id,
                wrapped_token_amount,
                broadcaster_fee_erc20_amount_recipient,
                send_with_public_wallet,
                overall_batch_min_gas_price,
                transaction_gas_details,
            } = params;
            log_debug!("populate proved base token unshield on {network_name}");
            sdk.populate_proved_unshield_base_token(
                txid_version,
                network_name,
                public_wallet_address,
                rail_wallet_id,
                wrapped_token_amount,
                broadcaster_fee_erc20_amount_recipient,
                send_with_public_wallet,
                overall_batch_min_gas_price,
                transaction_gas_details,
            )
            .await
        },
    );

    registry.register(
        |sdk: Arc<S>, params: PopulateProvedUnshieldToOriginParams| async move {
            let PopulateProvedUnshieldToOriginParams {
                txid_version,
                network_name,
                rail_wallet_id,
                erc20_amount_recipients,
                nft_amount_recipients,
                transaction_gas_details,
            } = params;
            log_debug!("populate proved unshield to origin on {network_name}");
            sdk.populate_proved_unshield_to_origin(
                txid_version,
                network_name,
                rail_wallet_id,
                erc20_amount_recipients,
                nft_amount_recipients,
                transaction_gas_details,
            )
            .await
        },
    );

    registry.register(
        |sdk: Arc<S>, params: GasEstimateForUnprovenUnshieldParams| async move {
            let GasEstimateForUnprovenUnshieldParams {
                txid_version,
                network_name,
                rail_wallet_id,
                encryption_key,
                erc20_amount_recipients,
                nft_amount_recipients,
                original_gas_details,
                fee_token_details,
                send_with_public_wallet,
            } = params;
            log_debug!("gas estimate for unproven unshield on {network_name}");
            sdk.gas_estimate_for_unproven_unshield(
                txid_version,
                network_name,
                rail_wallet_id,
                encryption_key,
                erc20_amount_recipients,
                nft_amount_recipients,
                original_gas_details,
                fee_token_details,
                send_with_public_wallet,
            )
            .await
        },
    );

    registry.register(
        |sdk: Arc<S>, params: GasEstimateForUnprovenUnshieldBaseTokenParams| async move {
            let GasEstimateForUnprovenUnshieldBaseTokenParams {
                txid_version,
                network_name,
                public_wallet_address,
                rail_wallet_id,
                encryption_key,
                wrapped_token_amount,
                original_gas_details,
                fee_token_details,
                send_with_public_wallet,
            } = params;
            log_debug!("gas estimate for unproven base token unshield on {network_name}");
            sdk.gas_estimate_for_unproven_unshield_base_token(
                txid_version,
                network_name,
                public_wallet_address,
                rail_wallet_id,
                encryption_key,
                wrapped_token_amount,
                original_gas_details,
                fee_token_details,
                send_with_public_wallet,
            )
            .await
        },
    );

    registry.register(
        |sdk: Arc<S>, params: GasEstimateForUnprovenUnshieldToOriginParams| async move {
            let GasEstimateForUnprovenUnshieldToOriginParams {
                original_shield_txid,
                txid_version,
                network_name,
                rail_wallet_id,
                encryption_key,
                erc20_amount_recipients,
                nft_amount_recipients,
            } = params;
            log_debug!("gas estimate for unproven unshield to origin on {network_name}");
            sdk.gas_estimate_for_unproven_unshield_to_origin(
                original_shield_txid,
                txid_version,
                network_name,
                rail_wallet_id,
                encryption_key,
                erc20_amount_recipients,
                nft_amount_recipients,
            )
            .await
        },
    );

    registry.register(
        |sdk: Arc<S>, params: GetErc20AndNftAmountRecipientsForUnshieldToOriginParams| async move {
            let GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
                txid_version,
                network_name,
                railgun_wallet_id,
                original_shield_txid,
            } = params;
            log_debug!("erc20 and nft recipients for unshield to origin on {network_name}");
            sdk.get_erc20_and_nft_amount_recipients_for_unshield_to_origin(
                txid_version,
                network_name,
                railgun_wallet_id,
                original_shield_txid,
            )
            .await
        },
    );
}
